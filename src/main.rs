use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use digit_cam::{Session, SessionConfig, StreamEvent};

/// 每隔多少帧保存一张 JPEG。
const SAVE_EVERY: u64 = 30;

fn main() {
    #[cfg(feature = "logging")]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SessionConfig::default();

    // 扫描设备
    println!("Scanning for USB devices...");
    let devices = digit_cam::scan_devices();
    println!("Found {} devices:", devices.len());
    for (i, d) in devices.iter().enumerate() {
        let mark = if d.vid == config.vid && d.pid == config.pid {
            "<-- FTDI bridge"
        } else {
            ""
        };
        println!("  [{}] {} {}", i, d.info, mark);
    }

    let out_dir = std::env::args().nth(1).map(PathBuf::from);
    if let Some(dir) = &out_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            println!("Cannot create {}: {}", dir.display(), e);
            return;
        }
    }

    let mut session: Session = Session::new(config);
    let events = match session.open() {
        Ok(rx) => rx,
        Err(e) => {
            println!("{}", e.user_message());
            if !e.is_selection_error() {
                println!("\nNote: on Linux you may need a udev rule granting access to 0403:6015.");
            }
            return;
        }
    };
    println!("Connected! Press Ctrl+C to stop.");

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        println!("Cannot install Ctrl+C handler: {}", e);
    }

    let mut frame_count = 0u64;
    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => event,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        match event {
            StreamEvent::Result(result) => {
                println!("AI reading: {:.6}", result.reading());
            }
            StreamEvent::Frame(frame) => {
                frame_count += 1;
                if frame_count % SAVE_EVERY != 1 {
                    continue;
                }
                if let Some(dir) = &out_dir {
                    let path = dir.join(format!("frame_{:06}.jpg", frame_count));
                    match std::fs::write(&path, &frame.jpeg) {
                        Ok(()) => println!("Saved {}", path.display()),
                        Err(e) => println!("Save error: {}", e),
                    }
                } else if let Ok(img) = frame.decode() {
                    println!("Frame #{}: {}x{}", frame_count, img.width(), img.height());
                }
            }
            StreamEvent::Throughput { fps, frames, bytes } => {
                println!("#{} | {:.1} fps | {} KB", frames, fps, bytes / 1024);
            }
        }
    }

    session.disconnect();
    println!("Disconnected!");
}
