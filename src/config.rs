//! Flat, TOML-loadable configuration (§4.8, §6.3).

use std::net::IpAddr;
use std::num::{NonZeroU32, NonZeroU8};
use std::path::Path;

use mediasoup::rtp_parameters::{
    MimeTypeAudio, MimeTypeVideo, RtcpFeedback, RtpCodecCapability, RtpCodecParametersParameters,
};
use mediasoup::worker::{WorkerLogLevel, WorkerLogTag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub worker_settings: WorkerSettingsConfig,
    pub router_options: RouterOptionsConfig,
    pub transport_options: TransportOptionsConfig,
    /// `None` disables producer-count enforcement entirely (§9 Open Question).
    pub participant_limits: Option<ParticipantLimits>,
    pub sweep_interval_ms: u64,
    pub max_routers_per_worker: usize,
    pub request_deadline_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_settings: WorkerSettingsConfig::default(),
            router_options: RouterOptionsConfig::default(),
            transport_options: TransportOptionsConfig::default(),
            participant_limits: None,
            sweep_interval_ms: 300_000,
            max_routers_per_worker: 5,
            request_deadline_ms: 5_000,
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to [`Config::default`] for any field the file omits.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSettingsConfig {
    pub log_level: WorkerLogLevelConfig,
    pub log_tags: Vec<WorkerLogTagConfig>,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
}

impl Default for WorkerSettingsConfig {
    fn default() -> Self {
        Self {
            log_level: WorkerLogLevelConfig::Warn,
            log_tags: vec![],
            rtc_min_port: 40_000,
            rtc_max_port: 49_999,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerLogLevelConfig {
    Debug,
    Warn,
    Error,
    None,
}

impl From<WorkerLogLevelConfig> for WorkerLogLevel {
    fn from(level: WorkerLogLevelConfig) -> Self {
        match level {
            WorkerLogLevelConfig::Debug => WorkerLogLevel::Debug,
            WorkerLogLevelConfig::Warn => WorkerLogLevel::Warn,
            WorkerLogLevelConfig::Error => WorkerLogLevel::Error,
            WorkerLogLevelConfig::None => WorkerLogLevel::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerLogTagConfig {
    Info,
    Ice,
    Dtls,
    Rtp,
    Srtp,
    Rtcp,
    Rtx,
    Bwe,
    Score,
    Simulcast,
    Svc,
    Sctp,
    Message,
}

impl From<WorkerLogTagConfig> for WorkerLogTag {
    fn from(tag: WorkerLogTagConfig) -> Self {
        match tag {
            WorkerLogTagConfig::Info => WorkerLogTag::Info,
            WorkerLogTagConfig::Ice => WorkerLogTag::Ice,
            WorkerLogTagConfig::Dtls => WorkerLogTag::Dtls,
            WorkerLogTagConfig::Rtp => WorkerLogTag::Rtp,
            WorkerLogTagConfig::Srtp => WorkerLogTag::Srtp,
            WorkerLogTagConfig::Rtcp => WorkerLogTag::Rtcp,
            WorkerLogTagConfig::Rtx => WorkerLogTag::Rtx,
            WorkerLogTagConfig::Bwe => WorkerLogTag::Bwe,
            WorkerLogTagConfig::Score => WorkerLogTag::Score,
            WorkerLogTagConfig::Simulcast => WorkerLogTag::Simulcast,
            WorkerLogTagConfig::Svc => WorkerLogTag::Svc,
            WorkerLogTagConfig::Sctp => WorkerLogTag::Sctp,
            WorkerLogTagConfig::Message => WorkerLogTag::Message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterOptionsConfig {
    pub media_codecs: Vec<CodecConfig>,
}

impl Default for RouterOptionsConfig {
    fn default() -> Self {
        Self {
            media_codecs: vec![CodecConfig::Opus, CodecConfig::Vp8],
        }
    }
}

/// A small, named set of codec presets rather than a fully generic codec descriptor — the
/// conferences this core hosts only ever negotiate Opus for audio and VP8/H264 for video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecConfig {
    Opus,
    Vp8,
    H264,
}

impl CodecConfig {
    pub fn to_capability(self) -> RtpCodecCapability {
        match self {
            CodecConfig::Opus => RtpCodecCapability::Audio {
                mime_type: MimeTypeAudio::Opus,
                preferred_payload_type: None,
                clock_rate: NonZeroU32::new(48_000).unwrap(),
                channels: NonZeroU8::new(2).unwrap(),
                parameters: RtpCodecParametersParameters::from([("useinbandfec", 1u32.into())]),
                rtcp_feedback: vec![RtcpFeedback::TransportCc],
            },
            CodecConfig::Vp8 => RtpCodecCapability::Video {
                mime_type: MimeTypeVideo::Vp8,
                preferred_payload_type: None,
                clock_rate: NonZeroU32::new(90_000).unwrap(),
                parameters: RtpCodecParametersParameters::default(),
                rtcp_feedback: vec![
                    RtcpFeedback::Nack,
                    RtcpFeedback::NackPli,
                    RtcpFeedback::CcmFir,
                    RtcpFeedback::GoogRemb,
                    RtcpFeedback::TransportCc,
                ],
            },
            CodecConfig::H264 => RtpCodecCapability::Video {
                mime_type: MimeTypeVideo::H264,
                preferred_payload_type: None,
                clock_rate: NonZeroU32::new(90_000).unwrap(),
                parameters: RtpCodecParametersParameters::from([
                    ("level-asymmetry-allowed", 1u32.into()),
                    ("packetization-mode", 1u32.into()),
                ]),
                rtcp_feedback: vec![
                    RtcpFeedback::Nack,
                    RtcpFeedback::NackPli,
                    RtcpFeedback::CcmFir,
                    RtcpFeedback::GoogRemb,
                    RtcpFeedback::TransportCc,
                ],
            },
        }
    }
}

impl RouterOptionsConfig {
    pub fn media_codecs(&self) -> Vec<RtpCodecCapability> {
        self.media_codecs.iter().copied().map(CodecConfig::to_capability).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportOptionsConfig {
    pub listen_ips: Vec<ListenIp>,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
    pub initial_available_outgoing_bitrate: u32,
}

impl Default for TransportOptionsConfig {
    fn default() -> Self {
        Self {
            listen_ips: vec![ListenIp {
                ip: "0.0.0.0".parse().unwrap(),
                announced_ip: None,
            }],
            enable_udp: true,
            enable_tcp: true,
            prefer_udp: true,
            initial_available_outgoing_bitrate: 600_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenIp {
    pub ip: IpAddr,
    pub announced_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLimits {
    pub max_audio_producers: usize,
    pub max_video_producers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.sweep_interval_ms, 300_000);
        assert_eq!(config.max_routers_per_worker, 5);
        assert!(config.participant_limits.is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.sweep_interval_ms, config.sweep_interval_ms);
        assert_eq!(
            parsed.router_options.media_codecs().len(),
            config.router_options.media_codecs().len()
        );
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: Config = toml::from_str("sweepIntervalMs = 60000").unwrap();
        assert_eq!(parsed.sweep_interval_ms, 60_000);
        assert_eq!(parsed.max_routers_per_worker, 5);
    }
}
