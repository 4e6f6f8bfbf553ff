//! Argon CLI — headless patch playback and WAV export.
//!
//! Usage:
//!   ar-cli <bank-dir>                          list patches
//!   ar-cli <bank-dir> --patch 5                play patch 5 live
//!   ar-cli <bank-dir> --patch 5 --wav out.wav  render patch 5 to WAV
//!   ar-cli <bank-dir> --notes 60,64,67         pick the demo notes

use ar_master::{Controller, NoteEvent};
use std::{env, fs, path::Path};

fn main() {
    let args: Vec<String> = env::args().collect();
    let bank_dir = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: ar-cli <bank-dir> [--patch N] [--wav output.wav] [--notes 60,64,67]");
        std::process::exit(1);
    });

    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let slot: Option<usize> = flag("--patch").and_then(|s| s.parse().ok());
    let wav_path = flag("--wav");
    let notes: Vec<u8> = flag("--notes")
        .map(|s| s.split(',').filter_map(|n| n.trim().parse().ok()).collect())
        .unwrap_or_else(|| vec![60, 64, 67]);

    let mut ctrl = Controller::new();
    let warnings = ctrl.load_bank(Path::new(bank_dir)).unwrap_or_else(|e| {
        eprintln!("Failed to load bank {}: {}", bank_dir, e);
        std::process::exit(1);
    });
    for w in &warnings {
        eprintln!("Warning: slot {}: {}", w.slot + 1, w.reason);
    }

    let Some(slot) = slot else {
        list_bank(&ctrl);
        return;
    };
    ctrl.select_patch(slot.saturating_sub(1));
    println!("Patch {}: {}", slot, ctrl.edit_patch().name());

    match wav_path {
        Some(path) => render_to_wav(&ctrl, &path, &notes),
        None => play_audio(&mut ctrl, &notes),
    }
}

fn list_bank(ctrl: &Controller) {
    for (i, name) in ctrl.bank().names().enumerate() {
        println!("{:3}  {}", i + 1, name);
    }
}

fn play_audio(ctrl: &mut Controller, notes: &[u8]) {
    ctrl.play();
    println!("Playing...");

    for &note in notes {
        ctrl.note_on(note, 0.9);
        std::thread::sleep(std::time::Duration::from_millis(400));
        ctrl.note_off(note);
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    // Let releases ring out.
    std::thread::sleep(std::time::Duration::from_millis(800));

    if let Some(snapshot) = ctrl.snapshot() {
        println!("Peak: {:.3}", snapshot.peak());
    }
    ctrl.stop();
    println!("Done.");
}

fn render_to_wav(ctrl: &Controller, path: &str, notes: &[u8]) {
    let sample_rate: u32 = 44100;
    println!("Rendering to {} at {} Hz...", path, sample_rate);

    let events: Vec<NoteEvent> = notes
        .iter()
        .enumerate()
        .map(|(i, &note)| NoteEvent {
            at: i as f32 * 0.5,
            note,
            velocity: 0.9,
            duration: 0.4,
        })
        .collect();
    let total = events.len() as f32 * 0.5 + 1.0;

    let wav = ctrl.render_to_wav(sample_rate, &events, total);
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", path, e);
        std::process::exit(1);
    });

    println!("Done.");
}
