//! `lipsync-demo`: plays a synthesized utterance's visemes in the terminal.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse arguments and load [`AppConfig`] (defaults on first run).
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Obtain a synthesis result: saved JSON file, `/synthesize`, or
//!    `/greeting`.
//! 5. Build a demo rig with one morph channel per viseme.
//! 6. Play the timeline against a [`TimedAudio`] clip and log every mouth
//!    change until the clip ends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use argh::FromArgs;
use tokio::sync::broadcast::error::RecvError;

use avatar_lipsync::{
    audio::{AudioEvent, AudioPlaybackHandle, TimedAudio},
    backend::{BackendClient, Synthesis, Utterance},
    config::AppConfig,
    morph::MorphWeights,
    player::{AudioSource, AvatarRig, VisemeSyncPlayer},
    viseme::{VisemeMap, VISEME_NAMES},
};

/// Audio keeps sounding briefly after the last viseme starts.
const TAIL_MS: u64 = 250;

#[derive(FromArgs)]
/// Play a tutor utterance's viseme timeline against a simulated clip.
struct Args {
    /// ask the backend to answer this text
    #[argh(option)]
    text: Option<String>,

    /// read a saved synthesis response (JSON) instead of calling the backend
    #[argh(option)]
    file: Option<PathBuf>,

    /// clip length in milliseconds (default: last viseme offset + 250)
    #[argh(option)]
    duration_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Arguments + configuration
    let args: Args = argh::from_env();
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(args, config))
}

async fn run(args: Args, config: AppConfig) -> anyhow::Result<()> {
    // 4. Synthesis result
    let backend = BackendClient::from_config(&config.backend);
    let Utterance { synthesis, timeline } = match (&args.file, &args.text) {
        (Some(path), _) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let synthesis: Synthesis = serde_json::from_str(&body)
                .with_context(|| format!("parsing {}", path.display()))?;
            Utterance::try_from(synthesis)?
        }
        (None, Some(text)) => backend.synthesize(text).await?,
        (None, None) => backend.greeting().await?,
    };

    log::info!("audio: {}", backend.audio_url(&synthesis));
    if let Some(board) = &synthesis.board_text {
        log::info!("board: {board}");
    }

    let timeline = Arc::new(timeline);
    let duration = args.duration_ms.map(Duration::from_millis).unwrap_or_else(|| {
        Duration::from_millis(timeline.last_offset_ms().ceil() as u64 + TAIL_MS)
    });
    log::info!("{} visemes over {:?}", timeline.len(), duration);

    // 5. Demo rig: channel i carries viseme i.
    let prefix = &config.lipsync.blend_shape_prefix;
    let dictionary: HashMap<String, usize> = VISEME_NAMES
        .iter()
        .enumerate()
        .map(|(channel, name)| (format!("{prefix}{name}"), channel))
        .collect();
    let map = VisemeMap::from_morph_dictionary(&dictionary, prefix);
    let (sink, weights) = MorphWeights::new(VISEME_NAMES.len()).shared();
    let rig = AvatarRig::new(sink, Arc::new(map));

    // 6. Play and report
    let audio = Arc::new(TimedAudio::new(duration));
    let mut events = audio.subscribe();
    let player = VisemeSyncPlayer::new(config.lipsync.clone());
    player
        .play(AudioSource::Owned(audio.clone()), timeline, &rig)
        .await?;

    let mut ticker = tokio::time::interval(config.lipsync.frame_interval());
    let mut shown: Option<usize> = None;
    loop {
        tokio::select! {
            event = events.recv() => {
                if matches!(event, Ok(AudioEvent::Ended) | Err(RecvError::Closed)) {
                    break;
                }
            }
            _ = ticker.tick() => {
                let channel = weights.lock().map(|w| w.active_channel()).unwrap_or(None);
                if channel != shown {
                    let name = channel.and_then(|c| VISEME_NAMES.get(c).copied()).unwrap_or("-");
                    log::info!("{:>6} ms  {name}", audio.position().as_millis());
                    shown = channel;
                }
            }
        }
    }

    log::info!("playback finished after {:?}", audio.position());
    Ok(())
}
