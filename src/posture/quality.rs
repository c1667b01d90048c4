use super::types::Keypoint;

/// COCO-17 indices of the joints that matter for sitting posture:
/// nose, both eyes, both shoulders, both hips.
pub const POSTURE_KEYPOINTS: [usize; 7] = [0, 1, 2, 5, 6, 11, 12];

/// Mean score of the posture joints that clear `visibility_floor`, or 0 when
/// none do. Advisory only.
pub fn keypoint_quality(keypoints: &[Keypoint], visibility_floor: f64) -> f64 {
    let (sum, count) = POSTURE_KEYPOINTS
        .iter()
        .filter_map(|&index| keypoints.get(index))
        .filter(|point| point.score > visibility_floor)
        .fold((0.0, 0usize), |(sum, count), point| (sum + point.score, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
