// mfc-core/src/units.rs

use uom::si::f64::VolumeRate as UomVolumeRate;

pub type VolumeRate = UomVolumeRate;

/// Volume flow in litres per minute, the unit every MFC reports in.
#[inline]
pub fn lpm(v: f64) -> VolumeRate {
    use uom::si::volume_rate::liter_per_minute;
    VolumeRate::new::<liter_per_minute>(v)
}

#[inline]
pub fn to_lpm(q: VolumeRate) -> f64 {
    use uom::si::volume_rate::liter_per_minute;
    q.get::<liter_per_minute>()
}

#[inline]
pub fn to_m3ps(q: VolumeRate) -> f64 {
    use uom::si::volume_rate::cubic_meter_per_second;
    q.get::<cubic_meter_per_second>()
}

#[inline]
pub fn m3ps(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v)
}

pub mod constants {
    /// Moles of air carrying one mole of O2 (21 % O2 by volume).
    pub const AIR_TO_O2_RATIO: f64 = 4.762;

    /// l/min per m³/s.
    pub const LPM_PER_M3PS: f64 = 60_000.0;

    /// J/kg per MJ/kg.
    pub const J_PER_MJ: f64 = 1e6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpm_converts_to_cubic_metres_per_second() {
        let q = lpm(60.0);
        assert!((to_m3ps(q) - 1e-3).abs() < 1e-15);
        assert!((to_lpm(m3ps(1.0)) - constants::LPM_PER_M3PS).abs() < 1e-9);
    }
}
