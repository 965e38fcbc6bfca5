//! ROI 标定配置和 80 字节载荷。
//!
//! 载荷布局（小端，与 Windows 上位机抓包一致）：
//!
//! | 偏移  | 大小 | 字段                                  |
//! |-------|------|---------------------------------------|
//! | 0-31  | 32   | 8 个参考点 `{u16 x, u16 y}`           |
//! | 32-33 | 2    | 数字位数                              |
//! | 34-35 | 2    | 表盘数（固定 0）                      |
//! | 36-43 | 8    | 保留，全 0                            |
//! | 44-75 | 32   | 表盘参考点，全 0                      |
//! | 76-77 | 2    | 数字边界宽                            |
//! | 78-79 | 2    | 数字边界高                            |

use crate::modules::constants::{
    CAL_H, CAL_W, ROI_BOUNDARY_X_OFFSET, ROI_BOUNDARY_Y_OFFSET, ROI_DATA_HDR,
    ROI_DEFAULT_BOUNDARY, ROI_MAX_DIGITS, ROI_MIN_DIGITS, ROI_NUM_DIALS_OFFSET,
    ROI_NUM_DIGITS_OFFSET, ROI_NUM_POINTS, ROI_PAYLOAD_SIZE, ROI_POINTS_OFFSET,
};

/// 参考点数量中的“位置”数，每个位置有上下两个角点。
const NUM_REFS: usize = ROI_NUM_POINTS / 2;

/// ROI 数据帧（帧头 + 载荷）长度。
pub const ROI_FRAME_SIZE: usize = ROI_DATA_HDR.len() + ROI_PAYLOAD_SIZE;

/// 320x240 标定空间中的点，左上角为原点。
///
/// 使用有符号坐标以便表示越界输入，编码时再截断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoiPoint {
    pub x: i32,
    pub y: i32,
}

impl RoiPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// ROI 配置：8 个参考点、数字位数和数字边界。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiConfig {
    /// 数字位数（4-8）。
    pub num_digits: u8,
    /// 4 个参考位置 x（上角, 下角）。
    pub points: [RoiPoint; ROI_NUM_POINTS],
    pub boundary_x: i32,
    pub boundary_y: i32,
}

impl RoiConfig {
    /// 创建配置，不足 8 个的点用 (0, 0) 补齐，多余的忽略。
    pub fn new(num_digits: u8, points: &[RoiPoint], boundary_x: i32, boundary_y: i32) -> Self {
        let mut all = [RoiPoint::default(); ROI_NUM_POINTS];
        for (slot, p) in all.iter_mut().zip(points) {
            *slot = *p;
        }
        Self {
            num_digits,
            points: all,
            boundary_x,
            boundary_y,
        }
    }

    /// 由覆盖数字区域的矩形计算参考点。
    ///
    /// 4 个参考位置从第一位数字中心均匀分布到最后一位数字中心，
    /// 每个位置取矩形上下边上的两个点；奇数点 y 较小。
    /// `flip_y` 时使用左下角原点（传感器坐标）。
    pub fn from_rect(
        rect: &RoiRect,
        num_digits: u8,
        boundary_x: i32,
        boundary_y: i32,
        flip_y: bool,
    ) -> Self {
        let n = num_digits.max(1) as f64;
        let (sin, cos) = rect.rotation_deg.to_radians().sin_cos();
        let digit_w = rect.width / n;
        let half_h = rect.height / 2.0;

        let to_cal = |lx: f64, ly: f64| -> (i32, i32) {
            let x = rect.center_x + lx * cos - ly * sin;
            let mut y = rect.center_y + lx * sin + ly * cos;
            if flip_y {
                y = CAL_H as f64 - y;
            }
            (clamp_u16(x.round()), clamp_u16(y.round()))
        };

        let mut points = [RoiPoint::default(); ROI_NUM_POINTS];
        for r in 0..NUM_REFS {
            let t = r as f64 / (NUM_REFS - 1) as f64;
            let center = digit_w / 2.0 + t * (rect.width - digit_w);
            let lx = -rect.width / 2.0 + center;

            let (tx, ty) = to_cal(lx, -half_h);
            let (bx, by) = to_cal(lx, half_h);
            let (low, high) = if ty <= by {
                (RoiPoint::new(tx, ty), RoiPoint::new(bx, by))
            } else {
                (RoiPoint::new(bx, by), RoiPoint::new(tx, ty))
            };
            points[r * 2] = low;
            points[r * 2 + 1] = high;
        }

        Self {
            num_digits,
            points,
            boundary_x,
            boundary_y,
        }
    }

    /// 使用默认边界 70x70 的 [`RoiConfig::from_rect`]。
    pub fn from_rect_default(rect: &RoiRect, num_digits: u8) -> Self {
        let b = ROI_DEFAULT_BOUNDARY as i32;
        Self::from_rect(rect, num_digits, b, b, false)
    }
}

fn clamp_u16(v: f64) -> i32 {
    v.clamp(0.0, u16::MAX as f64) as i32
}

/// 标定空间中的（可旋转）矩形，用于框选数字区域。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiRect {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    /// 顺时针旋转角（度）。
    pub rotation_deg: f64,
}

/// 编码后的 80 字节 ROI 载荷。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiPayload([u8; ROI_PAYLOAD_SIZE]);

impl RoiPayload {
    pub fn as_bytes(&self) -> &[u8; ROI_PAYLOAD_SIZE] {
        &self.0
    }

    /// 从 80 字节数据构造。
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; ROI_PAYLOAD_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.0[offset], self.0[offset + 1]])
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        self.0[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// 第 `i` 个参考点。
    pub fn point(&self, i: usize) -> Option<(u16, u16)> {
        if i >= ROI_NUM_POINTS {
            return None;
        }
        let off = ROI_POINTS_OFFSET + i * 4;
        Some((self.u16_at(off), self.u16_at(off + 2)))
    }

    pub fn num_digits(&self) -> u16 {
        self.u16_at(ROI_NUM_DIGITS_OFFSET)
    }

    pub fn num_dials(&self) -> u16 {
        self.u16_at(ROI_NUM_DIALS_OFFSET)
    }

    pub fn boundary(&self) -> (u16, u16) {
        (self.u16_at(ROI_BOUNDARY_X_OFFSET), self.u16_at(ROI_BOUNDARY_Y_OFFSET))
    }

    /// 解回配置。
    pub fn to_config(&self) -> RoiConfig {
        let mut points = [RoiPoint::default(); ROI_NUM_POINTS];
        for (i, p) in points.iter_mut().enumerate() {
            if let Some((x, y)) = self.point(i) {
                *p = RoiPoint::new(x as i32, y as i32);
            }
        }
        let (bx, by) = self.boundary();
        RoiConfig {
            num_digits: self.num_digits() as u8,
            points,
            boundary_x: bx as i32,
            boundary_y: by as i32,
        }
    }

    /// 帧头 `C0 5A 03 03` + 载荷。
    pub fn frame(&self) -> [u8; ROI_FRAME_SIZE] {
        let mut frame = [0u8; ROI_FRAME_SIZE];
        frame[..ROI_DATA_HDR.len()].copy_from_slice(&ROI_DATA_HDR);
        frame[ROI_DATA_HDR.len()..].copy_from_slice(&self.0);
        frame
    }

    /// 每行 16 字节的十六进制转储。
    pub fn hex_rows(&self) -> Vec<String> {
        self.0
            .chunks(16)
            .enumerate()
            .map(|(row, chunk)| {
                let start = row * 16;
                format!(
                    "Hex[{:02}-{:02}]: {}",
                    start,
                    start + chunk.len() - 1,
                    crate::modules::command::hex(chunk)
                )
            })
            .collect()
    }
}

fn clamp_coord(v: i32, max: u16) -> u16 {
    v.clamp(0, max as i32) as u16
}

/// 编码 ROI 配置。
///
/// 越界坐标、边界和位数会被截断并记录警告，不会报错；保留区域全部写 0。
pub fn build_roi_payload(config: &RoiConfig) -> RoiPayload {
    let mut payload = RoiPayload([0u8; ROI_PAYLOAD_SIZE]);

    let mut out_of_range = false;
    for (i, pt) in config.points.iter().enumerate() {
        let x = clamp_coord(pt.x, CAL_W);
        let y = clamp_coord(pt.y, CAL_H);
        if x as i32 != pt.x || y as i32 != pt.y {
            #[cfg(feature = "logging")]
            log::warn!(
                "P{} ({},{}) out of 0-{}/0-{} range, clamping",
                i + 1,
                pt.x,
                pt.y,
                CAL_W,
                CAL_H
            );
            out_of_range = true;
        }
        let off = ROI_POINTS_OFFSET + i * 4;
        payload.put_u16(off, x);
        payload.put_u16(off + 2, y);
    }
    if out_of_range {
        #[cfg(feature = "logging")]
        log::warn!("Coordinates clamped, payload may not match intended ROI");
    }

    let digits = config.num_digits.clamp(ROI_MIN_DIGITS, ROI_MAX_DIGITS);
    if digits != config.num_digits {
        #[cfg(feature = "logging")]
        log::warn!("numDigits {} clamped to {}", config.num_digits, digits);
    }
    payload.put_u16(ROI_NUM_DIGITS_OFFSET, digits as u16);
    payload.put_u16(ROI_NUM_DIALS_OFFSET, 0);

    let bx = clamp_coord(config.boundary_x, CAL_W);
    let by = clamp_coord(config.boundary_y, CAL_H);
    if bx as i32 != config.boundary_x || by as i32 != config.boundary_y {
        #[cfg(feature = "logging")]
        log::warn!(
            "Boundary ({},{}) clamped to ({},{})",
            config.boundary_x,
            config.boundary_y,
            bx,
            by
        );
    }
    payload.put_u16(ROI_BOUNDARY_X_OFFSET, bx);
    payload.put_u16(ROI_BOUNDARY_Y_OFFSET, by);

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::constants::{
        ROI_DIAL_REFS_OFFSET, ROI_DIAL_REFS_SIZE, ROI_RESERVED_OFFSET, ROI_RESERVED_SIZE,
    };

    fn sample_points() -> Vec<RoiPoint> {
        vec![
            RoiPoint::new(70, 100),
            RoiPoint::new(70, 140),
            RoiPoint::new(127, 100),
            RoiPoint::new(127, 140),
            RoiPoint::new(183, 100),
            RoiPoint::new(183, 140),
            RoiPoint::new(240, 100),
            RoiPoint::new(240, 140),
        ]
    }

    #[test]
    fn payload_matches_reference_layout() {
        let config = RoiConfig::new(6, &sample_points(), 70, 70);
        let payload = build_roi_payload(&config);
        let bytes = payload.as_bytes();

        assert_eq!(&bytes[0..4], &[70, 0, 100, 0]);
        assert_eq!(&bytes[28..32], &[240, 0, 140, 0]);
        assert_eq!(&bytes[32..34], &[0x06, 0x00]);
        assert_eq!(&bytes[34..36], &[0x00, 0x00]);
        assert!(bytes[ROI_RESERVED_OFFSET..ROI_RESERVED_OFFSET + ROI_RESERVED_SIZE]
            .iter()
            .all(|&b| b == 0));
        assert!(bytes[ROI_DIAL_REFS_OFFSET..ROI_DIAL_REFS_OFFSET + ROI_DIAL_REFS_SIZE]
            .iter()
            .all(|&b| b == 0));
        assert_eq!(&bytes[76..80], &[0x46, 0x00, 0x46, 0x00]);
    }

    #[test]
    fn in_range_config_decodes_back() {
        let config = RoiConfig::new(8, &sample_points(), 320, 240);
        let decoded = build_roi_payload(&config).to_config();
        assert_eq!(decoded, config);
    }

    #[test]
    fn payload_parses_from_captured_bytes() {
        let payload = build_roi_payload(&RoiConfig::new(6, &sample_points(), 70, 70));
        let frame = payload.frame();
        let parsed = RoiPayload::from_bytes(&frame[4..]).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.num_digits(), 6);
        assert_eq!(parsed.point(1), Some((70, 140)));
        assert!(RoiPayload::from_bytes(&frame).is_none());
        assert!(RoiPayload::from_bytes(&frame[..79]).is_none());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut points = sample_points();
        points[0] = RoiPoint::new(-5, 300);
        points[7] = RoiPoint::new(400, -1);
        let config = RoiConfig::new(12, &points, 500, -3);
        let payload = build_roi_payload(&config);

        assert_eq!(payload.point(0), Some((0, 240)));
        assert_eq!(payload.point(7), Some((320, 0)));
        assert_eq!(payload.num_digits(), 8);
        assert_eq!(payload.boundary(), (320, 0));
    }

    #[test]
    fn missing_points_are_zero_filled() {
        let config = RoiConfig::new(4, &sample_points()[..3], 70, 70);
        let payload = build_roi_payload(&config);
        assert_eq!(payload.point(2), Some((127, 100)));
        for i in 3..8 {
            assert_eq!(payload.point(i), Some((0, 0)));
        }
        assert_eq!(payload.point(8), None);
    }

    #[test]
    fn frame_prefixes_header() {
        let payload = build_roi_payload(&RoiConfig::new(6, &sample_points(), 70, 70));
        let frame = payload.frame();
        assert_eq!(frame.len(), 84);
        assert_eq!(&frame[..4], &[0xC0, 0x5A, 0x03, 0x03]);
        assert_eq!(&frame[4..], payload.as_bytes());
        assert_eq!(payload.hex_rows().len(), 5);
        assert!(payload.hex_rows()[4].starts_with("Hex[64-79]: "));
    }

    #[test]
    fn rect_spreads_references_across_digits() {
        let rect = RoiRect {
            center_x: 160.0,
            center_y: 120.0,
            width: 240.0,
            height: 40.0,
            rotation_deg: 0.0,
        };
        let config = RoiConfig::from_rect(&rect, 6, 70, 70, false);
        // digit width 40: centres of first and last digit at x=60 and x=260
        let xs: Vec<i32> = config.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![60, 60, 127, 127, 193, 193, 260, 260]);
        for pair in config.points.chunks(2) {
            assert_eq!(pair[0].y, 100);
            assert_eq!(pair[1].y, 140);
        }
    }

    #[test]
    fn rect_flip_keeps_low_y_first() {
        let rect = RoiRect {
            center_x: 160.0,
            center_y: 100.0,
            width: 200.0,
            height: 40.0,
            rotation_deg: 0.0,
        };
        let config = RoiConfig::from_rect(&rect, 4, 70, 70, true);
        // flipped: top edge y=80 -> 160, bottom edge y=120 -> 120
        assert_eq!(config.points[0].y, 120);
        assert_eq!(config.points[1].y, 160);
    }

    #[test]
    fn rotated_rect_swaps_corners() {
        let rect = RoiRect {
            center_x: 160.0,
            center_y: 120.0,
            width: 200.0,
            height: 40.0,
            rotation_deg: 180.0,
        };
        let config = RoiConfig::from_rect_default(&rect, 4);
        assert!(config.points[0].y < config.points[1].y);
        assert_eq!(config.points[0].x, 235);
        assert_eq!(config.points[6].x, 85);
        assert_eq!((config.boundary_x, config.boundary_y), (70, 70));
    }
}
