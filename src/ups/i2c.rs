//! Minimal userspace I2C: open /dev/i2c-N, bind the slave address, exchange
//! a command byte for a block response. No external vendor library.

use crate::ups::UpsError;

/// One command/response exchange with an I2C slave. The response carries
/// `len` payload bytes followed by one checksum byte.
pub trait I2cBus: Send {
    fn read_block(&mut self, command: u8, len: usize) -> Result<Vec<u8>, UpsError>;
}

#[cfg(target_os = "linux")]
pub use linux::LinuxI2cBus;

#[cfg(target_os = "linux")]
mod linux {
    use std::ffi::CString;
    use std::os::unix::io::RawFd;

    use super::I2cBus;
    use crate::ups::UpsError;

    // From <linux/i2c-dev.h>
    const I2C_SLAVE: libc::c_ulong = 0x0703;

    /// An open /dev/i2c-N device bound to a single slave address.
    pub struct LinuxI2cBus {
        fd: RawFd,
    }

    impl LinuxI2cBus {
        pub fn open(bus: u8, address: u16) -> Result<Self, UpsError> {
            let path = CString::new(format!("/dev/i2c-{}", bus))
                .map_err(|_| UpsError::Unreachable {
                    bus,
                    source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
                })?;

            let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
            if fd < 0 {
                return Err(UpsError::Unreachable {
                    bus,
                    source: std::io::Error::last_os_error(),
                });
            }

            let rc = unsafe { libc::ioctl(fd, I2C_SLAVE, address as libc::c_ulong) };
            if rc < 0 {
                let source = std::io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(UpsError::Unreachable { bus, source });
            }

            Ok(Self { fd })
        }
    }

    impl I2cBus for LinuxI2cBus {
        fn read_block(&mut self, command: u8, len: usize) -> Result<Vec<u8>, UpsError> {
            let cmd = [command];
            let written = unsafe {
                libc::write(self.fd, cmd.as_ptr() as *const libc::c_void, 1)
            };
            if written != 1 {
                return Err(UpsError::ReadFailed {
                    command,
                    source: std::io::Error::last_os_error(),
                });
            }

            // Payload plus trailing checksum byte
            let wanted = len + 1;
            let mut buf = vec![0u8; wanted];
            let got = unsafe {
                libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, wanted)
            };
            if got < 0 {
                return Err(UpsError::ReadFailed {
                    command,
                    source: std::io::Error::last_os_error(),
                });
            }
            if got as usize != wanted {
                return Err(UpsError::ShortResponse {
                    command,
                    got: got as usize,
                    wanted,
                });
            }

            Ok(buf)
        }
    }

    impl Drop for LinuxI2cBus {
        fn drop(&mut self) {
            unsafe { libc::close(self.fd) };
        }
    }
}
