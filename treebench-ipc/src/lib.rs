#![warn(missing_docs)]
//! Treebench IPC
//!
//! The isolation channel between the harness and its forked child replica:
//! - length-prefixed JSON framing over inherited pipes
//! - the parent→child case request and the child→parent result stream
//! - the result/options types both sides agree on

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{
    CaseOptions, CaseRequest, CaseResult, ChildMessage, CmdlineOverrides, HrTime,
};

/// Protocol version transmitted with every case request. A mismatch between
/// parent and child images means the child binary is stale.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable naming the read/write fds inherited by the child
/// (format: `<read_fd>,<write_fd>`). Absent in the child means stdin/stdout.
pub const IPC_FD_ENV: &str = "TREEBENCH_IPC_FD";
