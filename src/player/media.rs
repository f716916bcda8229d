//! Local media element for streamed audio
//!
//! rodio's `OutputStream` is not `Send`, so it lives on its own thread and the
//! rest of the app talks to it through a command channel. Every load and stop
//! takes a new generation; the audio thread drops loads that are no longer the
//! latest one.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::{mpsc, oneshot};

const TICK: Duration = Duration::from_millis(250);

/// Events a media element reports, named after their HTML media counterparts.
/// Load failures are not events; they come back from [`MediaElement::load`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    TimeUpdate(u32),
    LoadedMetadata { duration_ms: u32 },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Download the audio behind `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
    /// Decode `data` and start playing it in place of whatever was loaded
    async fn load(&self, data: Vec<u8>) -> Result<()>;
    fn play(&self);
    fn pause(&self);
    fn seek(&self, position_ms: u32);
    fn stop(&self);
}

enum AudioCommand {
    Load {
        data: Vec<u8>,
        generation: u64,
        reply: oneshot::Sender<std::result::Result<(), String>>,
    },
    Play,
    Pause,
    Seek(Duration),
    Stop,
}

pub struct RodioElement {
    commands: std_mpsc::Sender<AudioCommand>,
    http: reqwest::Client,
    /// Generation of the most recent load or stop
    latest: Arc<AtomicU64>,
}

impl RodioElement {
    /// Start the audio thread; media events arrive on the returned receiver
    pub fn spawn() -> Result<(Self, mpsc::UnboundedReceiver<MediaEvent>)> {
        let (cmd_tx, cmd_rx) = std_mpsc::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let latest = Arc::new(AtomicU64::new(0));

        let thread_latest = latest.clone();
        thread::Builder::new()
            .name("nova-audio".to_string())
            .spawn(move || audio_thread(cmd_rx, event_tx, thread_latest))
            .context("failed to start audio thread")?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok((Self { commands: cmd_tx, http, latest }, event_rx))
    }

    fn send(&self, command: AudioCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("Audio thread is gone");
        }
    }
}

#[async_trait]
impl MediaElement for RodioElement {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "Fetching audio stream");
        let data = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec();
        tracing::debug!(bytes = data.len(), "Audio stream fetched");
        Ok(data)
    }

    async fn load(&self, data: Vec<u8>) -> Result<()> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply, done) = oneshot::channel();
        self.commands
            .send(AudioCommand::Load { data, generation, reply })
            .map_err(|_| anyhow!("audio thread is gone"))?;
        done.await
            .map_err(|_| anyhow!("audio thread dropped the load request"))?
            .map_err(|e| anyhow!(e))
    }

    fn play(&self) {
        self.send(AudioCommand::Play);
    }

    fn pause(&self) {
        self.send(AudioCommand::Pause);
    }

    fn seek(&self, position_ms: u32) {
        self.send(AudioCommand::Seek(Duration::from_millis(position_ms as u64)));
    }

    fn stop(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        self.send(AudioCommand::Stop);
    }
}

fn emit(events: &mpsc::UnboundedSender<MediaEvent>, event: MediaEvent) {
    let _ = events.send(event);
}

fn audio_thread(
    commands: std_mpsc::Receiver<AudioCommand>,
    events: mpsc::UnboundedSender<MediaEvent>,
    latest: Arc<AtomicU64>,
) {
    let output: Option<(OutputStream, OutputStreamHandle)> = match OutputStream::try_default() {
        Ok(output) => Some(output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize audio output");
            None
        }
    };

    let mut sink: Option<Sink> = None;
    let mut playing = false;
    let mut finished = true;
    let mut last_time_update = Instant::now();

    loop {
        match commands.recv_timeout(TICK) {
            Ok(AudioCommand::Load { generation, reply, .. }) if generation != latest.load(Ordering::SeqCst) => {
                tracing::debug!(generation, "Dropping superseded load");
                let _ = reply.send(Ok(()));
            }
            Ok(AudioCommand::Load { data, reply, .. }) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                let result = start(output.as_ref().map(|(_, handle)| handle), data);
                match result {
                    Ok((new_sink, duration)) => {
                        if let Some(duration) = duration {
                            emit(&events, MediaEvent::LoadedMetadata { duration_ms: duration.as_millis() as u32 });
                        }
                        sink = Some(new_sink);
                        playing = true;
                        finished = false;
                        emit(&events, MediaEvent::Play);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        playing = false;
                        finished = true;
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Ok(AudioCommand::Play) => {
                if let Some(s) = &sink {
                    s.play();
                    playing = true;
                    emit(&events, MediaEvent::Play);
                }
            }
            Ok(AudioCommand::Pause) => {
                if let Some(s) = &sink {
                    s.pause();
                    playing = false;
                    emit(&events, MediaEvent::Pause);
                }
            }
            Ok(AudioCommand::Seek(position)) => {
                if let Some(s) = &sink {
                    match s.try_seek(position) {
                        Ok(()) => emit(&events, MediaEvent::TimeUpdate(position.as_millis() as u32)),
                        Err(e) => tracing::warn!(error = %e, "Seek failed"),
                    }
                }
            }
            Ok(AudioCommand::Stop) => {
                if let Some(s) = sink.take() {
                    s.stop();
                }
                playing = false;
                finished = true;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(s) = &sink else { continue };
        if finished {
            continue;
        }
        if s.empty() {
            finished = true;
            playing = false;
            emit(&events, MediaEvent::Ended);
        } else if playing && last_time_update.elapsed() >= TICK {
            last_time_update = Instant::now();
            emit(&events, MediaEvent::TimeUpdate(s.get_pos().as_millis() as u32));
        }
    }

    tracing::debug!("Audio thread stopped");
}

fn start(handle: Option<&OutputStreamHandle>, data: Vec<u8>) -> std::result::Result<(Sink, Option<Duration>), String> {
    let handle = handle.ok_or_else(|| "no audio output device".to_string())?;
    let source = Decoder::new(Cursor::new(data)).map_err(|e| format!("failed to decode audio: {}", e))?;
    let duration = source.total_duration();
    let sink = Sink::try_new(handle).map_err(|e| format!("failed to open audio sink: {}", e))?;
    sink.append(source);
    sink.play();
    Ok((sink, duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_thread(latest: u64) -> (
        std_mpsc::Sender<AudioCommand>,
        mpsc::UnboundedReceiver<MediaEvent>,
        thread::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = std_mpsc::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let latest = Arc::new(AtomicU64::new(latest));
        let handle = thread::spawn(move || audio_thread(cmd_rx, event_tx, latest));
        (cmd_tx, event_rx, handle)
    }

    fn load(commands: &std_mpsc::Sender<AudioCommand>, generation: u64) -> std::result::Result<(), String> {
        let (reply, done) = oneshot::channel();
        commands
            .send(AudioCommand::Load { data: b"not audio".to_vec(), generation, reply })
            .unwrap();
        done.blocking_recv().unwrap()
    }

    #[test]
    fn superseded_load_is_dropped_quietly() {
        let (commands, mut events, handle) = spawn_thread(2);
        assert_eq!(load(&commands, 1), Ok(()));
        drop(commands);
        handle.join().unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn failed_load_is_reported_only_through_the_reply() {
        let (commands, mut events, handle) = spawn_thread(1);
        assert!(load(&commands, 1).is_err());
        drop(commands);
        handle.join().unwrap();
        assert!(events.try_recv().is_err());
    }
}
