//! The filesystem operations [`Port`] depends on, with an OS-backed implementation and an
//! in-memory one for tests and dry runs.
//!
//! [`Port`]: crate::port::Port

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
    fs, io,
    ops::Bound,
};

use camino::{Utf8Path, Utf8PathBuf};

pub trait FileSystem: Debug {
    fn is_file(&self, path: &Utf8Path) -> bool;

    fn is_dir(&self, path: &Utf8Path) -> bool;

    fn exists(&self, path: &Utf8Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>>;

    /// Like [`Self::read`], but reports non-UTF-8 contents as [`io::ErrorKind::InvalidData`].
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()>;

    fn remove(&self, path: &Utf8Path) -> io::Result<()>;

    /// Returns the names of the immediate children of the directory at `path`, sorted.
    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<String>>;
}

/// A [`FileSystem`] backed by [`std::fs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_file(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }

    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        log::trace!("reading {path}");
        fs::read(path)
    }

    fn write(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    fn remove(&self, path: &Utf8Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => log::warn!("skipping non-UTF-8 entry {name:?} in {path}"),
            }
        }
        names.sort();
        Ok(names)
    }
}

/// An in-memory [`FileSystem`]. Directories exist implicitly for every ancestor of a file.
///
/// Writes go through a shared reference, so a [`Port`] holding one of these can have its files
/// changed between queries.
///
/// [`Port`]: crate::port::Port
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: RefCell<BTreeMap<Utf8PathBuf, Vec<u8>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<Utf8PathBuf>,
        C: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(path, contents)| (path.into(), contents.into()))
            .collect();
        Self {
            files: RefCell::new(files),
        }
    }

    pub fn write_text_file(&self, path: impl AsRef<Utf8Path>, contents: &str) {
        self.files
            .borrow_mut()
            .insert(path.as_ref().to_owned(), contents.as_bytes().to_owned());
    }

    pub fn write_binary_file(&self, path: impl AsRef<Utf8Path>, contents: &[u8]) {
        self.files
            .borrow_mut()
            .insert(path.as_ref().to_owned(), contents.to_owned());
    }

    /// Calls `f` with every file strictly below `dir`, in path order.
    fn for_each_descendant(&self, dir: &Utf8Path, mut f: impl FnMut(&Utf8Path)) {
        let files = self.files.borrow();
        let descendants = files
            .range::<Utf8Path, _>((Bound::Excluded(dir), Bound::Unbounded))
            .map(|(path, _)| path)
            .take_while(|path| path.starts_with(dir));
        for path in descendants {
            f(path);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn is_file(&self, path: &Utf8Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        let mut found = false;
        self.for_each_descendant(path, |_| found = true);
        found
    }

    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        self.files.borrow().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no mock file at {path}"))
        })
    }

    fn write(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        self.write_binary_file(path, contents);
        Ok(())
    }

    fn remove(&self, path: &Utf8Path) -> io::Result<()> {
        match self.files.borrow_mut().remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock file at {path}"),
            )),
        }
    }

    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<String>> {
        let mut names = BTreeSet::new();
        self.for_each_descendant(path, |descendant| {
            if let Some(name) = descendant
                .strip_prefix(path)
                .ok()
                .and_then(|rel| rel.components().next())
            {
                names.insert(name.as_str().to_owned());
            }
        });
        if names.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock directory at {path}"),
            ));
        }
        Ok(names.into_iter().collect())
    }
}

#[test]
fn mock_directories_are_implied_by_files() {
    let fs = MockFileSystem::with_files([
        ("/root/a/b.txt", "b"),
        ("/root/a/c/d.txt", "d"),
        ("/root/a-b.txt", "a-b"),
    ]);

    assert!(fs.is_dir(Utf8Path::new("/root")));
    assert!(fs.is_dir(Utf8Path::new("/root/a")));
    assert!(fs.is_dir(Utf8Path::new("/root/a/c")));
    assert!(!fs.is_dir(Utf8Path::new("/root/a/b.txt")));
    assert!(!fs.is_dir(Utf8Path::new("/root/a/c/d")));
    assert!(fs.is_file(Utf8Path::new("/root/a/b.txt")));
    assert!(!fs.is_file(Utf8Path::new("/root/a")));

    assert_eq!(
        fs.read_dir(Utf8Path::new("/root/a")).unwrap(),
        ["b.txt", "c"]
    );
    assert_eq!(
        fs.read_dir(Utf8Path::new("/root")).unwrap(),
        ["a", "a-b.txt"]
    );
    assert!(fs.read_dir(Utf8Path::new("/nope")).is_err());
}

#[test]
fn mock_read_write_remove() {
    let fs = MockFileSystem::new();
    let path = Utf8Path::new("/tmp/file.txt");
    assert!(!fs.exists(path));

    fs.write(path, b"contents").unwrap();
    assert_eq!(fs.read_to_string(path).unwrap(), "contents");

    fs.write_binary_file(path, b"\xC0");
    assert_eq!(
        fs.read_to_string(path).unwrap_err().kind(),
        io::ErrorKind::InvalidData
    );

    fs.remove(path).unwrap();
    assert!(!fs.exists(path));
    assert!(fs.remove(path).is_err());
}
