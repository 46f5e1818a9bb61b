//! Extended attribute syscalls. Final symlinks are never followed.
#![cfg_attr(any(target_os = "linux", target_os = "macos"), allow(unsafe_code))]

use crate::errors::Error;
use crate::xattr::Xattr;

#[cfg(any(target_os = "linux", target_os = "macos"))]
mod unix {
    use std::ffi::CString;
    use std::io;

    use libc::c_char;
    use libc::c_void;
    use libc::size_t;
    use libc::ssize_t;

    use crate::errors::Error;
    use crate::xattr::Xattr;

    #[cfg(target_os = "linux")]
    mod sys {
        use super::*;

        pub(super) unsafe fn list(path: *const c_char, buf: *mut c_char, size: size_t) -> ssize_t {
            unsafe { libc::llistxattr(path, buf, size) }
        }

        pub(super) unsafe fn get(
            path: *const c_char,
            name: *const c_char,
            buf: *mut c_void,
            size: size_t,
        ) -> ssize_t {
            unsafe { libc::lgetxattr(path, name, buf, size) }
        }

        pub(super) unsafe fn set(
            path: *const c_char,
            name: *const c_char,
            value: *const c_void,
            size: size_t,
        ) -> libc::c_int {
            unsafe { libc::lsetxattr(path, name, value, size, 0) }
        }

        pub(super) unsafe fn remove(path: *const c_char, name: *const c_char) -> libc::c_int {
            unsafe { libc::lremovexattr(path, name) }
        }
    }

    #[cfg(target_os = "macos")]
    mod sys {
        use super::*;

        pub(super) unsafe fn list(path: *const c_char, buf: *mut c_char, size: size_t) -> ssize_t {
            unsafe { libc::listxattr(path, buf, size, libc::XATTR_NOFOLLOW) }
        }

        pub(super) unsafe fn get(
            path: *const c_char,
            name: *const c_char,
            buf: *mut c_void,
            size: size_t,
        ) -> ssize_t {
            unsafe { libc::getxattr(path, name, buf, size, 0, libc::XATTR_NOFOLLOW) }
        }

        pub(super) unsafe fn set(
            path: *const c_char,
            name: *const c_char,
            value: *const c_void,
            size: size_t,
        ) -> libc::c_int {
            unsafe { libc::setxattr(path, name, value, size, 0, libc::XATTR_NOFOLLOW) }
        }

        pub(super) unsafe fn remove(path: *const c_char, name: *const c_char) -> libc::c_int {
            unsafe { libc::removexattr(path, name, libc::XATTR_NOFOLLOW) }
        }
    }

    fn c_string(s: &str) -> Result<CString, Error> {
        CString::new(s).map_err(|e| Error::InvalidArgument(format!("{s:?}: {e}")))
    }

    fn xattr_err(path: &str, op: &str, e: io::Error) -> Error {
        Error::Xattr {
            path: path.to_string(),
            how: format!("{op}: {e}"),
        }
    }

    fn unsupported(e: &io::Error) -> bool {
        e.raw_os_error() == Some(libc::ENOTSUP)
    }

    /// Calls `fill` with a growing buffer until the result fits.
    ///
    /// `fill(null, 0)` reports the size needed; ERANGE means the data grew
    /// between the two calls and we go around again.
    fn read_sized<F>(mut fill: F) -> io::Result<Vec<u8>>
    where
        F: FnMut(*mut c_void, size_t) -> ssize_t,
    {
        let mut buf = vec![0u8; 1024];
        loop {
            let n = fill(buf.as_mut_ptr().cast(), buf.len());
            if n >= 0 {
                buf.truncate(n as usize);
                return Ok(buf);
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ERANGE) {
                return Err(err);
            }
            let need = fill(std::ptr::null_mut(), 0);
            if need < 0 {
                return Err(io::Error::last_os_error());
            }
            buf.resize(need as usize, 0);
        }
    }

    fn names(path: &str, cpath: &CString) -> Result<Vec<String>, Error> {
        let raw = read_sized(|buf, size| unsafe { sys::list(cpath.as_ptr(), buf.cast(), size) });
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) if unsupported(&e) => {
                log::debug!("{path}: xattrs unsupported by filesystem");
                return Ok(vec![]);
            }
            Err(e) => return Err(xattr_err(path, "listxattr", e)),
        };
        Ok(raw
            .split(|b| *b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect())
    }

    pub(in crate::native) fn get(path: &str) -> Result<Xattr, Error> {
        let cpath = c_string(path)?;
        let mut attrs = Xattr::new();
        for name in names(path, &cpath)? {
            let cname = c_string(&name)?;
            let value = read_sized(|buf, size| unsafe {
                sys::get(cpath.as_ptr(), cname.as_ptr(), buf, size)
            })
            .map_err(|e| xattr_err(path, &format!("getxattr {name}"), e))?;
            attrs.insert(name, String::from_utf8_lossy(&value).into_owned());
        }
        Ok(attrs)
    }

    pub(in crate::native) fn set(path: &str, attrs: &Xattr) -> Result<(), Error> {
        let cpath = c_string(path)?;
        for (name, value) in &attrs.0 {
            let cname = c_string(name)?;
            let rc = unsafe {
                sys::set(
                    cpath.as_ptr(),
                    cname.as_ptr(),
                    value.as_ptr().cast(),
                    value.len(),
                )
            };
            if rc != 0 {
                return Err(xattr_err(
                    path,
                    &format!("setxattr {name}"),
                    io::Error::last_os_error(),
                ));
            }
        }
        Ok(())
    }

    pub(in crate::native) fn delete<S: AsRef<str>>(path: &str, names: &[S]) -> Result<(), Error> {
        let cpath = c_string(path)?;
        for name in names {
            let name = name.as_ref();
            let cname = c_string(name)?;
            let rc = unsafe { sys::remove(cpath.as_ptr(), cname.as_ptr()) };
            if rc != 0 {
                return Err(xattr_err(
                    path,
                    &format!("removexattr {name}"),
                    io::Error::last_os_error(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) fn get(path: &str) -> Result<Xattr, Error> {
    unix::get(path)
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) fn set(path: &str, attrs: &Xattr) -> Result<(), Error> {
    unix::set(path, attrs)
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) fn delete<S: AsRef<str>>(path: &str, names: &[S]) -> Result<(), Error> {
    unix::delete(path, names)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(crate) fn get(_path: &str) -> Result<Xattr, Error> {
    Ok(Xattr::new())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(crate) fn set(path: &str, _attrs: &Xattr) -> Result<(), Error> {
    Err(Error::Unsupported {
        what: format!("setxattr {path}"),
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(crate) fn delete<S: AsRef<str>>(path: &str, _names: &[S]) -> Result<(), Error> {
    Err(Error::Unsupported {
        what: format!("removexattr {path}"),
    })
}
