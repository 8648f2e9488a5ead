use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::frame::{FrameConfig, FrameReader, FrameWriter};
use crate::stream::{StreamConduit, StreamInbox};

/// Halves of one connected Unix socket conduit.
pub type UnixConduit = (StreamConduit<UnixStream>, StreamInbox<UnixStream>);

const TRANSPORT_NAME: &str = "unix-domain-socket";

/// Permission mode for created socket paths.
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Listening end of a Unix-domain-socket conduit (the hidden frame side).
///
/// The socket file is removed on drop, but only if the path still refers to
/// the socket this listener created.
pub struct UnixConduitListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
    config: FrameConfig,
}

impl UnixConduitListener {
    /// Bind with default frame configuration.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_config(path, FrameConfig::default())
    }

    /// Bind a filesystem socket, replacing a stale socket file if present.
    pub fn bind_with_config(path: impl AsRef<Path>, config: FrameConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bind_err = |path: &Path, source: std::io::Error| TransportError::Bind {
            path: path.to_path_buf(),
            source,
        };

        let len = path.as_os_str().len();
        if len >= MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: MAX_PATH_LEN,
            });
        }

        // Only ever remove sockets; anything else at the path is an error.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                ));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| bind_err(&path, e))?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| bind_err(&path, e))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(DEFAULT_SOCKET_MODE))
            .map_err(|e| bind_err(&path, e))?;
        let metadata = std::fs::symlink_metadata(&path).map_err(|e| bind_err(&path, e))?;

        info!(?path, "listening for page connection");

        Ok(Self {
            listener,
            path,
            created_inode: (metadata.dev(), metadata.ino()),
            config,
        })
    }

    /// Accept the next connection (blocking) and frame it.
    pub fn accept(&self) -> Result<UnixConduit> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        split_stream(stream, &self.config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixConduitListener {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket()
            && (metadata.dev(), metadata.ino()) == self.created_inode
        {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}

/// Connect to a listening frame side with default frame configuration.
pub fn connect(path: impl AsRef<Path>) -> Result<UnixConduit> {
    connect_with_config(path, &FrameConfig::default())
}

/// Connect to a listening frame side.
pub fn connect_with_config(path: impl AsRef<Path>, config: &FrameConfig) -> Result<UnixConduit> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(?path, "connected to frame side");
    split_stream(stream, config)
}

fn split_stream(stream: UnixStream, config: &FrameConfig) -> Result<UnixConduit> {
    let read_half = stream.try_clone()?;
    read_half.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;

    let conduit = StreamConduit::new(
        FrameWriter::with_max_payload(stream, config.max_payload_size),
        TRANSPORT_NAME,
    );
    let inbox = StreamInbox::new(FrameReader::with_max_payload(
        read_half,
        config.max_payload_size,
    ));
    Ok((conduit, inbox))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::traits::{Conduit, Inbox};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/ifrrpc-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn bind_accept_connect_roundtrip() {
        let dir = temp_dir("uds");
        let sock_path = dir.join("frame.sock");
        let listener = UnixConduitListener::bind(&sock_path).unwrap();

        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, DEFAULT_SOCKET_MODE);

        let path = sock_path.clone();
        let client = thread::spawn(move || {
            let (mut conduit, _inbox) = connect(&path).unwrap();
            conduit.post(b"hello").unwrap();
        });

        let (_conduit, mut inbox) = listener.accept().unwrap();
        let message = loop {
            if let Some(message) = inbox.next_message().unwrap() {
                break message;
            }
        };
        assert_eq!(message.as_ref(), b"hello");
        client.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long_is_rejected() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixConduitListener::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn bind_refuses_to_replace_regular_file() {
        let dir = temp_dir("uds-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixConduitListener::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(sock_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_without_listener_fails() {
        let dir = temp_dir("uds-none");
        let result = connect(dir.join("missing.sock"));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
