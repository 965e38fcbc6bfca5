//! ROI 标定示例
//!
//! 用一个覆盖数字区域的矩形计算 8 个参考点，发送到传感器，
//! 然后切换到 ROI 输出并打印几次识别结果。
//!
//! 运行方式：
//! ```bash
//! cargo run --example send_roi -- 6
//! ```

use std::time::{Duration, Instant};

use digit_cam::{RoiConfig, RoiRect, Session, SessionConfig, StreamEvent};

/// 数字区域（320x240 标定坐标）。
const RECT: RoiRect = RoiRect {
    center_x: 160.0,
    center_y: 120.0,
    width: 192.0,
    height: 36.0,
    rotation_deg: 0.0,
};

/// 等待识别结果的时间。
const WATCH_SECS: u64 = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "logging")]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let digits: u8 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(6);

    let mut session: Session = Session::new(SessionConfig::default());
    let events = match session.open() {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(());
        }
    };

    let roi = RoiConfig::from_rect_default(&RECT, digits);
    println!("ROI: {} digits", roi.num_digits);
    for (i, p) in roi.points.iter().enumerate() {
        println!("  P{}: ({}, {})", i + 1, p.x, p.y);
    }

    session.send_roi_config(&roi)?;
    session.show_roi()?;

    let deadline = Instant::now() + Duration::from_secs(WATCH_SECS);
    while Instant::now() < deadline {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(StreamEvent::Result(r)) => println!("AI: {:.2} ({}%)", r.reading(), r.confidence),
            Ok(_) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    session.show_full_image()?;
    session.disconnect();
    Ok(())
}
