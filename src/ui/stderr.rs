// Keeps audio backend chatter (ALSA, JACK probing) off the terminal
// The original stderr is kept open so it can be put back for fatal errors.

use anyhow::Result;

/// Points stderr at /dev/null until dropped, then restores the original.
#[cfg(unix)]
pub struct QuietStderr {
    saved: libc::c_int,
}

#[cfg(unix)]
impl QuietStderr {
    pub fn new() -> Result<Self> {
        use std::io::Error;

        unsafe {
            let saved = libc::dup(libc::STDERR_FILENO);
            if saved == -1 {
                return Err(anyhow::anyhow!("Failed to save stderr: {}", Error::last_os_error()));
            }

            let null_fd = libc::open(
                b"/dev/null\0".as_ptr() as *const libc::c_char,
                libc::O_WRONLY,
            );
            if null_fd == -1 {
                let err = Error::last_os_error();
                libc::close(saved);
                return Err(anyhow::anyhow!("Failed to open /dev/null: {}", err));
            }

            if libc::dup2(null_fd, libc::STDERR_FILENO) == -1 {
                let err = Error::last_os_error();
                libc::close(null_fd);
                libc::close(saved);
                return Err(anyhow::anyhow!("Failed to redirect stderr: {}", err));
            }

            libc::close(null_fd);
            Ok(Self { saved })
        }
    }
}

#[cfg(unix)]
impl Drop for QuietStderr {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved, libc::STDERR_FILENO);
            libc::close(self.saved);
        }
    }
}

#[cfg(not(unix))]
pub struct QuietStderr {
    _private: (),
}

#[cfg(not(unix))]
impl QuietStderr {
    pub fn new() -> Result<Self> {
        Ok(Self { _private: () })
    }
}
