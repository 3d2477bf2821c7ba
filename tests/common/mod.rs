#![allow(dead_code)]

use roadskel::intersection::TexInfo;
use roadskel::math::Point2;

/// Installs a warn-level subscriber once; `RUST_LOG` overrides it.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn tex(kind: u32, is_cap: bool) -> Option<TexInfo> {
    Some(TexInfo {
        material: if is_cap { format!("cap-{kind}") } else { format!("road-{kind}") },
        atlas_u: (0.0, 1.0),
        atlas_v: (0.0, 1.0),
        v_distance: 8.0,
    })
}

pub fn near(a: Point2, b: Point2) -> bool {
    (a - b).norm() < 1e-6
}
