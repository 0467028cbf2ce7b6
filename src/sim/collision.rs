//! Bullet/bubble hit detection
//!
//! Bubbles and bullets are both treated as points; a hit is any pair whose
//! centres are within the hit radius.

use glam::Vec2;

use super::state::Bullet;

/// Whether a bullet at `bullet_pos` hits a bubble centred at `bubble_pos`
#[inline]
pub fn is_hit(bubble_pos: Vec2, bullet_pos: Vec2, hit_radius: f32) -> bool {
    bubble_pos.distance_squared(bullet_pos) <= hit_radius * hit_radius
}

/// Index of the first live bullet that hits the bubble.
///
/// `consumed` flags bullets already spent on another bubble this frame.
pub fn first_hit(
    bubble_pos: Vec2,
    bullets: &[Bullet],
    consumed: &[bool],
    hit_radius: f32,
) -> Option<usize> {
    bullets
        .iter()
        .enumerate()
        .filter(|(i, _)| !consumed.get(*i).copied().unwrap_or(false))
        .find(|(_, b)| is_hit(bubble_pos, b.pos, hit_radius))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(id: u32, x: f32, y: f32) -> Bullet {
        Bullet {
            id,
            pos: Vec2::new(x, y),
        }
    }

    #[test]
    fn test_hit_radius_boundary() {
        let bubble = Vec2::new(100.0, 100.0);
        assert!(is_hit(bubble, Vec2::new(100.0, 140.0), 40.0));
        assert!(is_hit(bubble, Vec2::new(124.0, 132.0), 40.0)); // 3-4-5 at 40
        assert!(!is_hit(bubble, Vec2::new(100.0, 140.5), 40.0));
    }

    #[test]
    fn test_first_hit_skips_consumed() {
        let bubble = Vec2::new(60.0, 200.0);
        let bullets = vec![
            bullet(1, 60.0, 210.0),
            bullet(2, 300.0, 200.0),
            bullet(3, 65.0, 190.0),
        ];
        assert_eq!(first_hit(bubble, &bullets, &[false; 3], 40.0), Some(0));
        assert_eq!(
            first_hit(bubble, &bullets, &[true, false, false], 40.0),
            Some(2)
        );
        assert_eq!(first_hit(bubble, &bullets, &[true, false, true], 40.0), None);
    }
}
