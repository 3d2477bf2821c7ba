use num_traits::{One, Signed};
use tracing::{debug, trace, warn};

use crate::arrangement::{CurveId, VertexId};
use crate::math::{ExactPoint, Scalar};

use super::SegmentNetwork;

/// A dangling edge: `tip` has degree one, `base` is the other end.
#[derive(Debug, Clone, Copy)]
struct Finger {
    tip: VertexId,
    base: VertexId,
    curve: CurveId,
}

impl SegmentNetwork {
    /// Deletes short dangling edges and dangling edges that double back along
    /// a neighbouring edge. Repeats until nothing more is removed.
    pub fn remove_fingers(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let mut changed = false;
            for finger in self.fingers() {
                let Some(finger) = self.finger(finger.tip) else {
                    continue;
                };
                if self.is_spurious(finger) {
                    self.delete_finger(finger);
                    removed += 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        debug!(removed, "fingers removed");
        removed
    }

    /// Reconnects dangling edges that stop short of other geometry.
    ///
    /// From every tip a bounded cast goes straight ahead, then to the left,
    /// then to the right. The first crossing found replaces the finger by an
    /// edge from its base to the crossing.
    pub fn extend_fingers(&mut self) -> usize {
        let reach_units = self
            .config
            .coordinates
            .metres_to_units(self.config.extend_distance_m);

        let mut faces = None;
        let mut extended = 0;
        for finger in self.fingers() {
            let Some(finger) = self.finger(finger.tip) else {
                continue;
            };
            let (Some(tip), Some(base)) = (
                self.arrangement.point(finger.tip).cloned(),
                self.arrangement.point(finger.base).cloned(),
            ) else {
                continue;
            };
            let Ok(ahead) = (&tip - &base).with_approx_length(reach_units) else {
                continue;
            };

            // Face map is rebuilt only after the arrangement changed.
            let face_map = faces.get_or_insert_with(|| self.arrangement.faces());
            let hit = [ahead.clone(), ahead.perp_left(), ahead.perp_right()]
                .iter()
                .find_map(|reach| self.arrangement.shoot_ray(finger.tip, reach, face_map));
            let Some(hit) = hit else {
                continue;
            };

            let target = self.snap_to_endpoint(&hit.point, hit.curve);
            let Some(curve) = self.arrangement.remove_curve(finger.curve) else {
                continue;
            };
            faces = None;
            self.arrangement.remove_isolated_vertex(finger.tip);
            let (a, b) = if curve.source == finger.base {
                (&base, &target)
            } else {
                (&target, &base)
            };
            match self.arrangement.insert_segment(a, b, curve.data) {
                Ok(_) => {
                    trace!(from = %base, to = %target, "finger extended");
                    extended += 1;
                }
                Err(err) => warn!(%err, "could not extend finger"),
            }
        }
        debug!(extended, "fingers extended");
        extended
    }

    fn fingers(&self) -> Vec<Finger> {
        self.arrangement
            .vertices()
            .filter(|(_, v)| v.degree() == 1)
            .filter_map(|(id, _)| self.finger(id))
            .collect()
    }

    fn finger(&self, tip: VertexId) -> Option<Finger> {
        let vx = self.arrangement.vertex(tip)?;
        let [curve] = vx.curves() else {
            return None;
        };
        let base = self.arrangement.curve(*curve)?.opposite(tip);
        Some(Finger {
            tip,
            base,
            curve: *curve,
        })
    }

    /// A finger is spurious when it is shorter than the finger tolerance, or
    /// when its tip projects onto the angularly adjacent edges at its base
    /// within the projection tolerance.
    fn is_spurious(&self, finger: Finger) -> bool {
        let (Some(tip), Some(base)) = (
            self.arrangement.point(finger.tip),
            self.arrangement.point(finger.base),
        ) else {
            return false;
        };
        if self.metres(tip, base) < self.config.finger_length_m {
            trace!(at = %tip, "short finger");
            return true;
        }

        let around = self.arrangement.outgoing(finger.base);
        if around.len() < 2 {
            return false;
        }
        let Some(pos) = around.iter().position(|h| h.curve == finger.curve) else {
            return false;
        };
        let n = around.len();
        for neighbour in [around[(pos + 1) % n], around[(pos + n - 1) % n]] {
            let Some(seg) = self.arrangement.segment(neighbour.curve) else {
                continue;
            };
            let t = seg.parameter(tip);
            if t.is_negative() || t > Scalar::one() {
                continue;
            }
            let foot = seg.closest_point(tip);
            if self.metres(tip, &foot) < self.config.finger_projection_m {
                trace!(at = %tip, "finger doubles back");
                return true;
            }
        }
        false
    }

    fn delete_finger(&mut self, finger: Finger) {
        self.arrangement.remove_curve(finger.curve);
        self.arrangement.remove_isolated_vertex(finger.tip);
        self.arrangement.remove_isolated_vertex(finger.base);
    }

    /// Moves a cast hit onto an end of the crossed curve when it is within
    /// the finger tolerance of it on the ground, so no short stub is left
    /// behind.
    fn snap_to_endpoint(&self, hit: &ExactPoint, curve: CurveId) -> ExactPoint {
        let Some(c) = self.arrangement.curve(curve) else {
            return hit.clone();
        };
        [c.source, c.target]
            .iter()
            .filter_map(|&v| self.arrangement.point(v))
            .map(|p| (self.metres(p, hit), p))
            .filter(|(d, _)| *d <= self.config.finger_length_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map_or_else(|| hit.clone(), |(_, p)| p.clone())
    }
}
