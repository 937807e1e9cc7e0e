//! Device health and alert thresholds.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::ops::require_len;
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request};

const HEALTH_INFO_LEN: usize = 18;
const ALERT_CONFIG_LEN: usize = 16;

/// Value of `life_used` meaning the device does not report it.
const LIFE_USED_NOT_REPORTED: u8 = 0xFF;

/// Decoded GET_HEALTH_INFO output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthInfo {
    /// Device condition bits.
    pub health_status: u8,
    /// Media state.
    pub media_status: u8,
    /// Extra per-field status bits.
    pub additional_status: u8,
    /// Percent of device life consumed, 0xFF when not reported.
    pub life_used: u8,
    /// Device temperature in degrees Celsius.
    pub device_temperature: i16,
    /// Shutdowns without a clean flush.
    pub dirty_shutdown_count: u32,
    /// Corrected errors in volatile memory.
    pub corrected_volatile_error_count: u32,
    /// Corrected errors in persistent memory.
    pub corrected_persistent_error_count: u32,
}

impl HealthInfo {
    /// Device asks for maintenance.
    #[must_use]
    pub fn maintenance_needed(&self) -> bool {
        self.health_status & 0x01 != 0
    }

    /// Device is running degraded.
    #[must_use]
    pub fn performance_degraded(&self) -> bool {
        self.health_status & 0x02 != 0
    }

    /// Device asks to be replaced.
    #[must_use]
    pub fn hardware_replacement_needed(&self) -> bool {
        self.health_status & 0x04 != 0
    }

    /// Life used as a percentage, when the device reports one.
    #[must_use]
    pub fn life_used_percent(&self) -> Option<u8> {
        (self.life_used != LIFE_USED_NOT_REPORTED).then_some(self.life_used)
    }
}

/// Issue GET_HEALTH_INFO and decode the reply.
pub fn get_health_info(endpoint: &mut dyn Endpoint) -> Result<HealthInfo> {
    let payload = endpoint
        .send(&Request::new(Opcode::GET_HEALTH_INFO))?
        .into_payload()?;
    parse_health(&payload)
}

fn parse_health(payload: &[u8]) -> Result<HealthInfo> {
    require_len(Opcode::GET_HEALTH_INFO, payload, HEALTH_INFO_LEN)?;

    let mut rest = payload;
    Ok(HealthInfo {
        health_status: rest.read_u8()?,
        media_status: rest.read_u8()?,
        additional_status: rest.read_u8()?,
        life_used: rest.read_u8()?,
        device_temperature: rest.read_i16::<LittleEndian>()?,
        dirty_shutdown_count: rest.read_u32::<LittleEndian>()?,
        corrected_volatile_error_count: rest.read_u32::<LittleEndian>()?,
        corrected_persistent_error_count: rest.read_u32::<LittleEndian>()?,
    })
}

/// Decoded GET_ALERT_CONFIG output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AlertConfig {
    /// Which alerts carry valid thresholds.
    pub valid_alerts: u8,
    /// Which warning thresholds the host may program.
    pub programmable_alerts: u8,
    /// Critical alert threshold for life used, percent.
    pub life_used_critical: u8,
    /// Programmable warning threshold for life used, percent.
    pub life_used_warning: u8,
    /// Critical over-temperature threshold, degrees Celsius.
    pub over_temp_critical: i16,
    /// Critical under-temperature threshold, degrees Celsius.
    pub under_temp_critical: i16,
    /// Programmable over-temperature warning, degrees Celsius.
    pub over_temp_warning: i16,
    /// Programmable under-temperature warning, degrees Celsius.
    pub under_temp_warning: i16,
    /// Corrected volatile memory error warning threshold.
    pub volatile_error_warning: u16,
    /// Corrected persistent memory error warning threshold.
    pub persistent_error_warning: u16,
}

/// Issue GET_ALERT_CONFIG and decode the reply.
pub fn get_alert_config(endpoint: &mut dyn Endpoint) -> Result<AlertConfig> {
    let payload = endpoint
        .send(&Request::new(Opcode::GET_ALERT_CONFIG))?
        .into_payload()?;
    parse_alert_config(&payload)
}

fn parse_alert_config(payload: &[u8]) -> Result<AlertConfig> {
    require_len(Opcode::GET_ALERT_CONFIG, payload, ALERT_CONFIG_LEN)?;

    let mut rest = payload;
    Ok(AlertConfig {
        valid_alerts: rest.read_u8()?,
        programmable_alerts: rest.read_u8()?,
        life_used_critical: rest.read_u8()?,
        life_used_warning: rest.read_u8()?,
        over_temp_critical: rest.read_i16::<LittleEndian>()?,
        under_temp_critical: rest.read_i16::<LittleEndian>()?,
        over_temp_warning: rest.read_i16::<LittleEndian>()?,
        under_temp_warning: rest.read_i16::<LittleEndian>()?,
        volatile_error_warning: rest.read_u16::<LittleEndian>()?,
        persistent_error_warning: rest.read_u16::<LittleEndian>()?,
    })
}

/// Programmable warning thresholds for SET_ALERT_CONFIG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertSettings {
    /// Which threshold fields of this request are valid.
    pub valid_actions: u8,
    /// Which alerts to enable.
    pub enable_actions: u8,
    /// Life-used warning threshold, percent.
    pub life_used_warning: u8,
    /// Over-temperature warning, degrees Celsius.
    pub over_temp_warning: i16,
    /// Under-temperature warning, degrees Celsius.
    pub under_temp_warning: i16,
    /// Corrected volatile memory error warning threshold.
    pub volatile_error_warning: u16,
    /// Corrected persistent memory error warning threshold.
    pub persistent_error_warning: u16,
}

/// Issue SET_ALERT_CONFIG with the given thresholds.
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
pub fn set_alert_config(endpoint: &mut dyn Endpoint, settings: &AlertSettings) -> Result<()> {
    let mut payload = Vec::with_capacity(12);
    payload.write_u8(settings.valid_actions).unwrap();
    payload.write_u8(settings.enable_actions).unwrap();
    payload.write_u8(settings.life_used_warning).unwrap();
    payload.write_u8(0).unwrap();
    payload
        .write_i16::<LittleEndian>(settings.over_temp_warning)
        .unwrap();
    payload
        .write_i16::<LittleEndian>(settings.under_temp_warning)
        .unwrap();
    payload
        .write_u16::<LittleEndian>(settings.volatile_error_warning)
        .unwrap();
    payload
        .write_u16::<LittleEndian>(settings.persistent_error_warning)
        .unwrap();

    endpoint
        .send(&Request::with_payload(Opcode::SET_ALERT_CONFIG, payload))?
        .into_payload()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health_payload() -> Vec<u8> {
        let mut p = vec![
            0x03, // maintenance needed + degraded
            0x00, // media normal
            0x10, // additional
            42,   // life used
        ];
        p.extend_from_slice(&(-5i16).to_le_bytes());
        p.extend_from_slice(&7u32.to_le_bytes());
        p.extend_from_slice(&100u32.to_le_bytes());
        p.extend_from_slice(&3u32.to_le_bytes());
        assert_eq!(p.len(), HEALTH_INFO_LEN);
        p
    }

    #[test]
    fn test_parse_health_info() {
        let info = parse_health(&health_payload()).unwrap();
        assert!(info.maintenance_needed());
        assert!(info.performance_degraded());
        assert!(!info.hardware_replacement_needed());
        assert_eq!(info.life_used_percent(), Some(42));
        assert_eq!(info.device_temperature, -5);
        assert_eq!(info.dirty_shutdown_count, 7);
        assert_eq!(info.corrected_volatile_error_count, 100);
        assert_eq!(info.corrected_persistent_error_count, 3);
    }

    #[test]
    fn test_life_used_not_reported() {
        let mut payload = health_payload();
        payload[3] = 0xFF;
        let info = parse_health(&payload).unwrap();
        assert_eq!(info.life_used_percent(), None);
    }

    #[test]
    fn test_parse_alert_config() {
        let mut p = vec![0x0F, 0x0C, 90, 75];
        p.extend_from_slice(&85i16.to_le_bytes());
        p.extend_from_slice(&(-10i16).to_le_bytes());
        p.extend_from_slice(&80i16.to_le_bytes());
        p.extend_from_slice(&0i16.to_le_bytes());
        p.extend_from_slice(&1000u16.to_le_bytes());
        p.extend_from_slice(&500u16.to_le_bytes());
        assert_eq!(p.len(), ALERT_CONFIG_LEN);

        let config = parse_alert_config(&p).unwrap();
        assert_eq!(config.valid_alerts, 0x0F);
        assert_eq!(config.life_used_critical, 90);
        assert_eq!(config.over_temp_critical, 85);
        assert_eq!(config.under_temp_critical, -10);
        assert_eq!(config.volatile_error_warning, 1000);
        assert_eq!(config.persistent_error_warning, 500);
    }
}
