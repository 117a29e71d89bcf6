//! The `play` command: wire the pipeline together and drive it from a
//! small interactive prompt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use narrata_core::{ChapterStore, find_voice};
use narrata_library::{FsChapterStore, Progress};
use narrata_narration::{
    CommandSynthesizer, Mood, MusicLibrary, MusicPlayer, NarrationEvent, NarrationSession,
    RodioOutput, SessionConfig, SessionState,
};

use crate::commands::PlayArgs;

const HELP: &str = "\
controls:
  p          pause / resume
  n          next paragraph
  b          previous paragraph
  j C [P]    jump to chapter C (paragraph P)
  v 0-100    narration volume
  m          toggle combat music (when --music-dir is set)
  q          quit (progress is saved)";

pub async fn run(args: PlayArgs, novel_dir: PathBuf) -> anyhow::Result<()> {
    let progress_path = novel_dir.join("progress.json");
    let mut progress = Progress::load(&progress_path);

    // CLI arguments override saved progress unless --resume was asked for.
    if !args.resume {
        if let Some(chapter) = args.chapter {
            progress.chapter = chapter;
            progress.paragraph = args.paragraph.unwrap_or(1);
        } else if let Some(paragraph) = args.paragraph {
            progress.paragraph = paragraph;
        }
        if let Some(ref voice) = args.voice {
            progress.voice = voice.clone();
        }
        if let Some(rate) = args.rate {
            progress.rate_percent = rate;
        }
        if let Some(volume) = args.volume {
            progress.volume = f32::from(volume.min(100)) / 100.0;
        }
    }

    let Some(voice) = find_voice(&progress.voice) else {
        bail!(
            "unknown voice '{}' — run `narrata voices` for the catalog",
            progress.voice
        );
    };

    // ── Wire the pipeline ──────────────────────────────────────────
    let store = Arc::new(FsChapterStore::open(&novel_dir));
    if store.available_chapters().is_empty() {
        bail!("no chapters found under {}", novel_dir.join("chapters").display());
    }
    let title = store.metadata().title.clone();

    let synth = Arc::new(CommandSynthesizer::new(args.synth_command.clone()));
    let output = Arc::new(RodioOutput::new().context("failed to open audio output")?);

    let mut music = args.music_dir.as_deref().map(|dir| {
        let library = MusicLibrary::discover(dir);
        let mut player = MusicPlayer::new(output.handle(), library);
        player.set_volume(progress.music_volume);
        player
    });
    if let Some(ref mut player) = music {
        if let Err(e) = player.play(Mood::Reading) {
            tracing::warn!(error = %e, "Background music unavailable");
        }
    }

    let (mut session, mut events) = NarrationSession::new(
        store.clone() as Arc<dyn ChapterStore>,
        synth,
        output,
        SessionConfig {
            voice_id: voice.voice_id.to_string(),
            rate_percent: progress.rate_percent,
            volume: progress.volume,
            ..SessionConfig::default()
        },
    );

    if !title.is_empty() {
        println!("{title}");
    }
    println!("{HELP}\n");

    session
        .start(progress.chapter, progress.paragraph)
        .context("could not start narration")?;

    // ── Render events in the background ────────────────────────────
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                NarrationEvent::ChapterStarted {
                    chapter,
                    title,
                    paragraphs,
                } => println!("\n== Chapter {chapter}: {title} ({paragraphs} paragraphs) =="),
                NarrationEvent::Paragraph {
                    paragraph,
                    total,
                    text,
                    ..
                } => println!("[{paragraph}/{total}] {text}"),
                NarrationEvent::StateChanged(SessionState::Paused) => println!("-- paused --"),
                NarrationEvent::StateChanged(SessionState::Running) => println!("-- playing --"),
                NarrationEvent::Error(message) => eprintln!("error: {message}"),
                NarrationEvent::Finished => {
                    println!("\nEnd of novel. Press q to exit.");
                }
                NarrationEvent::StateChanged(_) => {}
            }
        }
    });

    // ── Interactive command loop ───────────────────────────────────
    let mut editor = DefaultEditor::new()?;
    loop {
        if session.state() == SessionState::Stopped {
            break;
        }

        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = handle_command(line.trim(), &mut session, music.as_mut()) {
            // Command failures (e.g. jump to a missing chapter) are
            // conversational, not fatal.
            eprintln!("{e}");
        }
        if line.trim() == "q" {
            break;
        }
    }

    // ── Teardown: stop threads, persist position ───────────────────
    let cursor = session.cursor();
    if let Err(e) = session.stop() {
        tracing::warn!(error = %e, "Session teardown was not clean");
    }
    renderer.abort();

    progress.chapter = cursor.chapter;
    progress.paragraph = cursor.paragraph;
    progress
        .save(&progress_path)
        .context("failed to save progress")?;
    println!(
        "Saved position: chapter {}, paragraph {}.",
        cursor.chapter, cursor.paragraph
    );

    Ok(())
}

fn handle_command(
    line: &str,
    session: &mut NarrationSession,
    music: Option<&mut MusicPlayer>,
) -> anyhow::Result<()> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => Ok(()),
        Some("p") => {
            if session.state() == SessionState::Paused {
                session.resume()?;
            } else {
                session.pause()?;
            }
            Ok(())
        }
        Some("n") => Ok(session.skip_forward()?),
        Some("b") => Ok(session.skip_back()?),
        Some("j") => {
            let chapter: u32 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .context("usage: j CHAPTER [PARAGRAPH]")?;
            let paragraph: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
            Ok(session.jump_to(chapter, paragraph)?)
        }
        Some("v") => {
            let percent: u8 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .context("usage: v 0-100")?;
            session.set_volume(f32::from(percent.min(100)) / 100.0);
            Ok(())
        }
        Some("m") => {
            if let Some(player) = music {
                let next = match player.mood() {
                    Some(Mood::Combat) => Mood::Reading,
                    _ => Mood::Combat,
                };
                player.play(next)?;
            } else {
                eprintln!("no music directory configured (--music-dir)");
            }
            Ok(())
        }
        Some("q") => Ok(()),
        Some("h" | "help" | "?") => {
            println!("{HELP}");
            Ok(())
        }
        Some(other) => {
            eprintln!("unknown command '{other}' — h for help");
            Ok(())
        }
    }
}

pub fn list_chapters(novel_dir: &Path) -> anyhow::Result<()> {
    let store = FsChapterStore::open(novel_dir);
    let chapters = store.available_chapters();

    if chapters.is_empty() {
        println!("No chapters under {}", novel_dir.join("chapters").display());
        return Ok(());
    }

    let title = &store.metadata().title;
    if !title.is_empty() {
        println!("{title}");
    }
    println!(
        "{} chapters available ({}..={})",
        chapters.len(),
        chapters.first().copied().unwrap_or(0),
        chapters.last().copied().unwrap_or(0),
    );
    Ok(())
}

pub fn list_voices() {
    for voice in narrata_core::voice_catalog() {
        let default = if voice.name == narrata_core::DEFAULT_VOICE.name {
            "  (default)"
        } else {
            ""
        };
        println!("{:<10} {:<36} {}{default}", voice.name, voice.voice_id, voice.description);
    }
}
