use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::LinkStream;

/// Host-side link endpoint over a Unix domain socket.
///
/// When each chip runs as a host process, its end of the wire is exposed as a
/// socket path: one side binds and accepts, the other connects. The resulting
/// [`LinkStream`] behaves like the raw UART byte stream.
pub struct LinkSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl LinkSocket {
    /// Maximum socket path length (`sockaddr_un.sun_path` limit).
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the local end of the link and listen for the peer chip.
    ///
    /// A stale socket file left by a previous run is removed first; any other
    /// kind of file at the path is an error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale link socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, "link endpoint listening");

        Ok(Self { listener, path })
    }

    /// Accept the peer chip's connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!("peer chip connected");
        Ok(LinkStream::from_unix(stream))
    }

    /// Connect to a listening link endpoint (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<LinkStream> {
        let path = path.as_ref();
        let stream =
            std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected to link endpoint");
        Ok(LinkStream::from_unix(stream))
    }

    /// The path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LinkSocket {
    fn drop(&mut self) {
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket() {
                debug!(path = ?self.path, "removing link socket file");
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}
