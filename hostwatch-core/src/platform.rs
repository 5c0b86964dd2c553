use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Native command that lists listening sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerCommand {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl fmt::Display for ListenerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Platform-specific parts of the security sweep.
pub trait PlatformAdapter: Send + Sync {
    fn open_ports_command(&self) -> ListenerCommand;

    /// Whether the file at `path` is readable beyond its owner and group.
    fn is_insecure(&self, path: &Path) -> io::Result<bool>;

    /// Walks `dir` recursively and returns insecure files in discovery order.
    /// Entries that cannot be read or classified are logged and skipped.
    fn list_insecure_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut insecure = Vec::new();

        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(dir).display().to_string();
                    tracing::warn!("Error walking {}: {}", path, e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            // Symlinked directories are not descended into and are not files
            if entry.path_is_symlink() && entry.path().is_dir() {
                continue;
            }

            match self.is_insecure(entry.path()) {
                Ok(true) => insecure.push(entry.into_path()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        "Error checking permissions for {}: {}",
                        entry.path().display(),
                        e
                    );
                }
            }
        }

        insecure
    }
}

/// Mode-bit rules: a file is insecure when "other" may read it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixAdapter;

impl PlatformAdapter for PosixAdapter {
    fn open_ports_command(&self) -> ListenerCommand {
        ListenerCommand {
            program: "ss",
            args: &["-tuln"],
        }
    }

    #[cfg(unix)]
    fn is_insecure(&self, path: &Path) -> io::Result<bool> {
        use nix::sys::stat::{stat, Mode};

        let st = stat(path)?;
        Ok(Mode::from_bits_truncate(st.st_mode).contains(Mode::S_IROTH))
    }

    #[cfg(not(unix))]
    fn is_insecure(&self, _path: &Path) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "mode bits are not available on this platform",
        ))
    }
}

/// ACL rules: a file is insecure when its security descriptor carries no
/// DACL, or a NULL DACL that grants everyone access.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsAdapter;

impl PlatformAdapter for WindowsAdapter {
    fn open_ports_command(&self) -> ListenerCommand {
        ListenerCommand {
            program: "netstat",
            args: &["-an"],
        }
    }

    #[cfg(windows)]
    fn is_insecure(&self, path: &Path) -> io::Result<bool> {
        win_acl::has_restrictive_dacl(path).map(|restrictive| !restrictive)
    }

    #[cfg(not(windows))]
    fn is_insecure(&self, _path: &Path) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "security descriptors are only available on Windows",
        ))
    }
}

/// The adapter for the platform this binary was built for.
pub fn native() -> Arc<dyn PlatformAdapter> {
    if cfg!(windows) {
        Arc::new(WindowsAdapter)
    } else {
        Arc::new(PosixAdapter)
    }
}

#[cfg(windows)]
mod win_acl {
    //! advapi32 security descriptor queries.

    use std::ffi::c_void;
    use std::io;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    const DACL_SECURITY_INFORMATION: u32 = 0x0000_0004;

    #[link(name = "advapi32")]
    extern "system" {
        fn GetFileSecurityW(
            file_name: *const u16,
            requested_information: u32,
            security_descriptor: *mut c_void,
            length: u32,
            length_needed: *mut u32,
        ) -> i32;

        fn GetSecurityDescriptorDacl(
            security_descriptor: *const c_void,
            dacl_present: *mut i32,
            dacl: *mut *mut c_void,
            dacl_defaulted: *mut i32,
        ) -> i32;
    }

    pub fn has_restrictive_dacl(path: &Path) -> io::Result<bool> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();

        let mut needed: u32 = 0;
        // SAFETY: a null buffer with zero length only asks for the required size
        unsafe {
            GetFileSecurityW(
                wide.as_ptr(),
                DACL_SECURITY_INFORMATION,
                ptr::null_mut(),
                0,
                &mut needed,
            );
        }
        if needed == 0 {
            return Err(io::Error::last_os_error());
        }

        // u64 storage keeps the descriptor pointer-aligned
        let mut buffer = vec![0u64; (needed as usize).div_ceil(8)];
        // SAFETY: buffer holds at least `needed` bytes
        let ok = unsafe {
            GetFileSecurityW(
                wide.as_ptr(),
                DACL_SECURITY_INFORMATION,
                buffer.as_mut_ptr().cast(),
                needed,
                &mut needed,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }

        let mut present: i32 = 0;
        let mut defaulted: i32 = 0;
        let mut dacl: *mut c_void = ptr::null_mut();
        // SAFETY: buffer now holds a self-relative security descriptor
        let ok = unsafe {
            GetSecurityDescriptorDacl(buffer.as_ptr().cast(), &mut present, &mut dacl, &mut defaulted)
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(present != 0 && !dacl.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_commands_per_platform() {
        assert_eq!(PosixAdapter.open_ports_command().to_string(), "ss -tuln");
        assert_eq!(WindowsAdapter.open_ports_command().to_string(), "netstat -an");
    }

    #[test]
    fn native_adapter_matches_build_target() {
        let expected = if cfg!(windows) { "netstat" } else { "ss" };
        assert_eq!(native().open_ports_command().program, expected);
    }

    #[cfg(unix)]
    mod posix {
        use super::*;
        use std::fs::{self, Permissions};
        use std::os::unix::fs::PermissionsExt;

        fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, "secret").unwrap();
            fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();
            path
        }

        #[test]
        fn world_readable_bit_decides() {
            let dir = tempfile::tempdir().unwrap();
            let open = write_file(dir.path(), "open.conf", 0o644);
            let closed = write_file(dir.path(), "closed.conf", 0o640);

            assert!(PosixAdapter.is_insecure(&open).unwrap());
            assert!(!PosixAdapter.is_insecure(&closed).unwrap());
        }

        #[test]
        fn walk_reports_only_world_readable_files() {
            let dir = tempfile::tempdir().unwrap();
            let open = write_file(dir.path(), "open.conf", 0o604);
            write_file(dir.path(), "closed.conf", 0o600);

            assert_eq!(PosixAdapter.list_insecure_files(dir.path()), vec![open]);
        }

        #[test]
        fn walk_descends_into_subdirectories() {
            let dir = tempfile::tempdir().unwrap();
            let nested = dir.path().join("a").join("b");
            fs::create_dir_all(&nested).unwrap();
            let deep = write_file(&nested, "deep.key", 0o644);

            assert_eq!(PosixAdapter.list_insecure_files(dir.path()), vec![deep]);
        }

        #[test]
        fn dangling_symlink_is_skipped() {
            let dir = tempfile::tempdir().unwrap();
            let open = write_file(dir.path(), "open.conf", 0o644);
            std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling"))
                .unwrap();

            assert_eq!(PosixAdapter.list_insecure_files(dir.path()), vec![open]);
        }

        #[test]
        fn symlinked_directory_is_not_reported() {
            let dir = tempfile::tempdir().unwrap();
            let target = tempfile::tempdir().unwrap();
            fs::set_permissions(target.path(), Permissions::from_mode(0o755)).unwrap();
            std::os::unix::fs::symlink(target.path(), dir.path().join("linked")).unwrap();

            assert!(PosixAdapter.list_insecure_files(dir.path()).is_empty());
        }

        #[test]
        fn missing_directory_yields_nothing() {
            let dir = tempfile::tempdir().unwrap();
            assert!(PosixAdapter
                .list_insecure_files(&dir.path().join("absent"))
                .is_empty());
        }
    }
}
