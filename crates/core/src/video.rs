//! Subprocess-backed video frame source. A child process speaks raw decoded
//! frames (caller-known pixel format and dimensions) on its standard output;
//! a bounded frame queue between the reader task and the consumer provides
//! backpressure — when the queue is full, the reader stops draining the
//! subprocess's stdout pipe, which fills the kernel pipe buffer, which
//! blocks the subprocess's own write, which (for a real decoder that
//! interleaves read/decode/write) eventually slows its stdin consumption
//! too. This is the only mechanism that bounds memory for long videos.

use std::process::Stdio;

use speedreader_common::{Image, Result, SpeedReaderError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::VideoConfig;

/// The decoded frame's pixel dimensions; frames are assumed packed RGB8
/// (`width * height * 3` bytes), matching `speedreader_common::Image`.
#[derive(Debug, Clone, Copy)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn frame_byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Subprocess lifecycle, per §4.12: `Idle -> Starting -> Streaming ->
/// Draining -> Terminated`, with any state able to jump straight to
/// `Terminated` on cancellation or a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Starting,
    Streaming,
    Draining,
    Terminated,
}

/// A bounded, backpressured, frame-sampled `Image` stream backed by a
/// subprocess. Construct with [`VideoFrameSource::spawn`]; pull frames with
/// [`VideoFrameSource::next_frame`].
pub struct VideoFrameSource {
    state: std::sync::Arc<std::sync::Mutex<DecoderState>>,
    frames: mpsc::Receiver<Result<Image>>,
    cancellation: CancellationToken,
    _reader: tokio::task::JoinHandle<()>,
    _stderr: Option<tokio::task::JoinHandle<()>>,
    _writer: Option<tokio::task::JoinHandle<()>>,
}

impl VideoFrameSource {
    /// Spawns `command` (stdout piped; stdin piped iff `input` is `Some`)
    /// and starts the reader/writer/stderr-drain tasks. `dims` and
    /// `config.sample_rate` are fixed for the lifetime of this source.
    pub async fn spawn(
        mut command: Command,
        dims: FrameDimensions,
        config: VideoConfig,
        input: Option<Box<dyn AsyncRead + Send + Unpin>>,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        let state = std::sync::Arc::new(std::sync::Mutex::new(DecoderState::Starting));

        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child: Child = command
            .spawn()
            .map_err(|e| SpeedReaderError::decoder(format!("failed to spawn decoder subprocess: {e}")))?;

        *state.lock().expect("video source state mutex poisoned") = DecoderState::Streaming;
        debug!("video decoder subprocess started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpeedReaderError::decoder("subprocess has no stdout pipe"))?;
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        let stderr_handle = stderr.map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => warn!(decoder_stderr = %line, "video decoder subprocess stderr"),
                        Ok(None) | Err(_) => break,
                    }
                }
            })
        });

        let writer_handle = match (input, stdin) {
            (Some(mut input), Some(mut stdin)) => {
                let write_cancellation = cancellation.clone();
                Some(tokio::spawn(async move {
                    tokio::select! {
                        _ = write_cancellation.cancelled() => {}
                        result = tokio::io::copy(&mut input, &mut stdin) => {
                            if let Err(e) = result {
                                warn!(error = %e, "error writing compressed bytes to decoder stdin");
                            }
                        }
                    }
                    let _ = stdin.shutdown().await;
                }))
            }
            _ => None,
        };

        let (tx, rx) = mpsc::channel(config.frame_queue_capacity.max(1));
        let reader_cancellation = cancellation.clone();
        let reader_state = state.clone();
        let sample_rate = config.sample_rate.max(1);

        let reader_handle = tokio::spawn(async move {
            run_reader(
                stdout,
                child,
                dims,
                sample_rate,
                tx,
                reader_state,
                reader_cancellation,
            )
            .await;
        });

        Ok(Self {
            state,
            frames: rx,
            cancellation,
            _reader: reader_handle,
            _stderr: stderr_handle,
            _writer: writer_handle,
        })
    }

    pub fn state(&self) -> DecoderState {
        *self.state.lock().expect("video source state mutex poisoned")
    }

    /// Pulls the next sampled frame. Resolves to `None` once the subprocess
    /// has exited cleanly and every buffered frame has been consumed.
    pub async fn next_frame(&mut self) -> Option<Result<Image>> {
        self.frames.recv().await
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// Owns the subprocess handle for the lifetime of the read loop so that a
/// cancellation can kill it directly; reaped via `child.wait()` once the
/// loop exits either way.
async fn run_reader(
    mut stdout: tokio::process::ChildStdout,
    mut child: Child,
    dims: FrameDimensions,
    sample_rate: u32,
    tx: mpsc::Sender<Result<Image>>,
    state: std::sync::Arc<std::sync::Mutex<DecoderState>>,
    cancellation: CancellationToken,
) {
    let frame_len = dims.frame_byte_len();
    let mut buf = vec![0u8; frame_len];
    let mut frame_index: u64 = 0;

    loop {
        let read_result = tokio::select! {
            _ = cancellation.cancelled() => {
                set_state(&state, DecoderState::Terminated);
                let _ = child.kill().await;
                let _ = tx.send(Err(SpeedReaderError::Cancelled)).await;
                debug!("video decoder cancelled mid-stream");
                return;
            }
            result = stdout.read_exact(&mut buf) => result,
        };

        match read_result {
            Ok(_) => {
                let emit = frame_index % sample_rate as u64 == 0;
                frame_index += 1;
                if !emit {
                    continue;
                }
                match Image::new(dims.width, dims.height, buf.clone()) {
                    Ok(image) => {
                        if tx.send(Ok(image)).await.is_err() {
                            break;
                        }
                    }
                    Err(fault) => {
                        let _ = tx.send(Err(fault)).await;
                        break;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                set_state(&state, DecoderState::Draining);
                debug!("video decoder subprocess exhausted input; draining");
                break;
            }
            Err(e) => {
                let _ = tx
                    .send(Err(SpeedReaderError::decoder(format!(
                        "error reading frame from decoder subprocess: {e}"
                    ))))
                    .await;
                break;
            }
        }
    }

    let _ = child.wait().await;
    set_state(&state, DecoderState::Terminated);
    debug!(frames_seen = frame_index, "video decoder subprocess terminated");
}

fn set_state(state: &std::sync::Arc<std::sync::Mutex<DecoderState>>, next: DecoderState) {
    *state.lock().expect("video source state mutex poisoned") = next;
}
