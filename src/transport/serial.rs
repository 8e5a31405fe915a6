//! Serial transport. No serial-port crate is available, so rather than
//! fabricate a dependency this opens the tty device directly with `libc`
//! and configures it with raw `termios`, polling readiness through tokio's
//! [`AsyncFd`](tokio::io::unix::AsyncFd) — the standard way to bring a
//! raw, non-`mio`-aware fd into the tokio reactor.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use tokio::io::unix::AsyncFd;

use super::Transport;

pub struct SerialTransport {
    fd: AsyncFd<OwnedFd>,
    path: String,
    dtr_on_close: bool,
}

impl SerialTransport {
    pub fn open(path: &str, baud: u32, dtr_on_close: bool) -> Result<Self> {
        // SAFETY: `path` is a NUL-terminated C string we build ourselves.
        let cpath = std::ffi::CString::new(path).context("serial path contains a NUL byte")?;
        let raw: RawFd = unsafe {
            libc::open(
                cpath.as_ptr(),
                libc::O_RDWR | libc::O_NOCTTY | libc::O_NONBLOCK,
            )
        };
        if raw < 0 {
            bail!(
                "failed to open serial device {path}: {}",
                std::io::Error::last_os_error()
            );
        }
        // SAFETY: `open` returned a valid, owned fd on success.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };

        configure_raw(owned.as_raw_fd(), baud)
            .with_context(|| format!("configuring termios on {path}"))?;

        let fd = AsyncFd::new(owned).context("registering serial fd with tokio reactor")?;

        Ok(Self {
            fd,
            path: path.to_string(),
            dtr_on_close,
        })
    }

    fn set_dtr(&self, on: bool) {
        let bits: libc::c_int = libc::TIOCM_DTR;
        unsafe {
            libc::ioctl(
                self.fd.get_ref().as_raw_fd(),
                if on { libc::TIOCMBIS } else { libc::TIOCMBIC } as _,
                &bits as *const _,
            );
        }
    }
}

fn configure_raw(fd: RawFd, baud: u32) -> Result<()> {
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut termios) != 0 {
            bail!("tcgetattr failed: {}", std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut termios);
        let speed = termios_speed(baud);
        libc::cfsetispeed(&mut termios, speed);
        libc::cfsetospeed(&mut termios, speed);
        termios.c_cc[libc::VMIN] = 0;
        termios.c_cc[libc::VTIME] = 0;
        if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
            bail!("tcsetattr failed: {}", std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn termios_speed(baud: u32) -> libc::speed_t {
    match baud {
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        230400 => libc::B230400,
        460800 => libc::B460800,
        921600 => libc::B921600,
        _ => libc::B115200,
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; 4096];
        loop {
            let mut guard = self.fd.readable_mut().await?;
            let raw_fd = self.fd.get_ref().as_raw_fd();
            let n = unsafe { libc::read(raw_fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            if n >= 0 {
                return Ok(buf[..n as usize].to_vec());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                guard.clear_ready();
                return Ok(Vec::new());
            }
            return Err(err.into());
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let raw_fd = self.fd.get_ref().as_raw_fd();
        let n = unsafe { libc::write(raw_fd, bytes.as_ptr() as *const _, bytes.len()) };
        if n < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    async fn readable(&mut self) {
        let _ = self.fd.readable().await;
    }

    async fn close(&mut self) -> Result<()> {
        if self.dtr_on_close {
            self.set_dtr(false);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.path
    }
}
