//! Queued-buffer audio output for simpleaudio
//!
//! Adapts a blocking open/read/write/close stream contract onto devices that
//! only play pre-filled buffers from a queue. See [`scheduler`] for how each
//! write is mapped onto a device buffer.

pub mod backend;
pub mod device;
pub mod format;
pub mod pool;
pub mod scheduler;
pub mod session;

pub use backend::{create_backend, AudioBackend, Backend, NullAudioBackend, QueuedBackend};
pub use device::{CpalDriver, QueueDriver, SimDriver};
pub use format::{buffer_format, BufferFormat};
pub use pool::BufferPool;
pub use scheduler::{PollWait, WriteScheduler};
pub use session::{SessionConfig, SessionState, StreamSession};
