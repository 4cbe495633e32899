//! CrewLink: lightweight voice relay for Among Us

use super::{GameKind, Specialization};
use crate::composition::StepOverrides;
use crate::domain::container::{ContainerOverrides, HealthProbe};
use crate::domain::image::ImageRef;
use crate::domain::service::SizingOverride;
use crate::domain::traffic::{Protocol, TrafficProfile};

pub const IMAGE: &str = "ottomated/crewlink-server";
pub const PORT: u16 = 9736;

pub fn specialization() -> Specialization {
    Specialization {
        kind: GameKind::CrewLink,
        image: ImageRef::registry(IMAGE),
        sizing: SizingOverride::default(),
        traffic: TrafficProfile::new(PORT, Protocol::Tcp),
        mount_paths: Vec::new(),
        container: ContainerOverrides::default()
            .with_env("ADDRESS", "0.0.0.0")
            .with_health_check(HealthProbe::shell(format!(
                "curl --fail http://localhost:{}",
                PORT
            ))),
        overrides: StepOverrides::new(),
    }
}
