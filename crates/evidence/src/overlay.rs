//! Operator-feedback overlay drawing

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use inference_engine::DetectionSample;

const BOX_COLOR: Rgb<u8> = Rgb([61, 220, 132]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([66, 133, 244]);

/// Draw face boxes and landmarks onto `canvas`.
///
/// Detection geometry is scaled from the analyzed frame's coordinates to
/// the canvas dimensions and clamped; degenerate boxes are skipped. The
/// overlay is purely cosmetic and cannot fail.
pub fn draw_detections(canvas: &mut RgbImage, sample: &DetectionSample) {
    if sample.frame_width == 0 || sample.frame_height == 0 {
        return;
    }
    let (cw, ch) = canvas.dimensions();
    if cw == 0 || ch == 0 {
        return;
    }
    let sx = cw as f32 / sample.frame_width as f32;
    let sy = ch as f32 / sample.frame_height as f32;

    for face in &sample.faces {
        let x = (face.bbox.x * sx).clamp(0.0, cw as f32 - 1.0) as i32;
        let y = (face.bbox.y * sy).clamp(0.0, ch as f32 - 1.0) as i32;
        let w = ((face.bbox.width * sx) as u32).min(cw - x as u32);
        let h = ((face.bbox.height * sy) as u32).min(ch - y as u32);
        if w < 2 || h < 2 {
            continue;
        }
        draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(w, h), BOX_COLOR);

        if let Some(landmarks) = &face.landmarks {
            for (px, py) in landmarks {
                let lx = (px * sx).clamp(0.0, cw as f32 - 1.0) as i32;
                let ly = (py * sy).clamp(0.0, ch as f32 - 1.0) as i32;
                draw_cross_mut(canvas, LANDMARK_COLOR, lx, ly);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_engine::{FaceBox, FaceObservation};

    fn face(x: f32, y: f32, w: f32, h: f32) -> FaceObservation {
        FaceObservation {
            bbox: FaceBox {
                x,
                y,
                width: w,
                height: h,
            },
            confidence: 0.9,
            landmarks: Some(vec![(x + w / 2.0, y + h / 2.0)]),
            descriptor: None,
        }
    }

    fn sample(faces: Vec<FaceObservation>) -> DetectionSample {
        DetectionSample {
            faces,
            frame_width: 320,
            frame_height: 240,
        }
    }

    #[test]
    fn test_draws_box_pixels() {
        let mut canvas = RgbImage::new(320, 240);
        draw_detections(&mut canvas, &sample(vec![face(10.0, 10.0, 50.0, 50.0)]));
        assert_eq!(*canvas.get_pixel(10, 10), BOX_COLOR);
    }

    #[test]
    fn test_scales_to_canvas_dimensions() {
        // Canvas at double the detection frame resolution
        let mut canvas = RgbImage::new(640, 480);
        draw_detections(&mut canvas, &sample(vec![face(10.0, 10.0, 50.0, 50.0)]));
        assert_eq!(*canvas.get_pixel(20, 20), BOX_COLOR);
    }

    #[test]
    fn test_out_of_range_geometry_is_clamped() {
        let mut canvas = RgbImage::new(320, 240);
        draw_detections(
            &mut canvas,
            &sample(vec![face(-50.0, -50.0, 10_000.0, 10_000.0)]),
        );
    }

    #[test]
    fn test_unknown_frame_dimensions_draw_nothing() {
        let mut canvas = RgbImage::new(320, 240);
        let empty = DetectionSample::default();
        draw_detections(&mut canvas, &empty);
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_degenerate_box_skipped() {
        let mut canvas = RgbImage::new(320, 240);
        draw_detections(&mut canvas, &sample(vec![face(10.0, 10.0, 0.5, 0.5)]));
        assert_eq!(*canvas.get_pixel(10, 10), Rgb([0, 0, 0]));
    }
}
