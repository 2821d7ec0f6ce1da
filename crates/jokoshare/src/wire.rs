//! Text commands exchanged between peers.
//!
//! ```text
//! GW2INFO <participant> <json record>
//! REQUESTGW2INFO <participant>
//! ```
//! `GW2INFO` carries the id of the sender. `REQUESTGW2INFO` carries the id of the requester, who wants our record.
use joko_core::prelude::*;

use crate::record::{ParticipantId, PresenceRecord};

pub const PRESENCE_UPDATE: &str = "GW2INFO";
pub const PRESENCE_REQUEST: &str = "REQUESTGW2INFO";
/// plugin commands of the voice client are limited in size. a record is usually a few hundred bytes.
pub const MAX_COMMAND_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PresenceUpdate {
        participant: ParticipantId,
        record: PresenceRecord,
    },
    PresenceRequest {
        participant: ParticipantId,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum WireError {
    #[error("empty command")]
    Empty,
    #[error("{kind} expects {expected} parameters, found {found}")]
    ParameterCount {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid participant id: {0:?}")]
    InvalidParticipant(String),
    #[error("invalid presence payload")]
    Payload(#[source] serde_json::Error),
    #[error("failed to encode presence record")]
    Encode(#[source] serde_json::Error),
    #[error("command is {0} bytes long, which exceeds the limit of {max}", max = MAX_COMMAND_LEN)]
    TooLong(usize),
}

pub fn encode_record(record: &PresenceRecord) -> Result<String, WireError> {
    serde_json::to_string(record).map_err(WireError::Encode)
}

pub fn decode_record(payload: &str) -> Result<PresenceRecord, WireError> {
    serde_json::from_str(payload).map_err(WireError::Payload)
}

pub fn encode_update(sender: ParticipantId, record: &PresenceRecord) -> Result<String, WireError> {
    let command = format!("{PRESENCE_UPDATE} {sender} {}", encode_record(record)?);
    if command.len() > MAX_COMMAND_LEN {
        return Err(WireError::TooLong(command.len()));
    }
    Ok(command)
}

pub fn encode_request(requester: ParticipantId) -> String {
    format!("{PRESENCE_REQUEST} {requester}")
}

fn parse_participant(s: &str) -> Result<ParticipantId, WireError> {
    s.parse::<u16>()
        .map(ParticipantId)
        .map_err(|_| WireError::InvalidParticipant(s.to_string()))
}

/// `Ok(None)` for commands we don't know. They might come from a newer version of the plugin.
pub fn parse_command(text: &str) -> Result<Option<Command>, WireError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(WireError::Empty);
    }
    let (kind, rest) = text.split_once(' ').unwrap_or((text, ""));
    let rest = rest.trim_start();
    match kind {
        PRESENCE_UPDATE => {
            // the json payload may contain spaces, so it is everything after the participant
            let (participant, payload) = match rest.split_once(' ') {
                Some((participant, payload)) if !payload.trim().is_empty() => (participant, payload),
                _ => {
                    return Err(WireError::ParameterCount {
                        kind: PRESENCE_UPDATE,
                        expected: 2,
                        found: rest.split_whitespace().count().min(1),
                    })
                }
            };
            let participant = parse_participant(participant)?;
            let record = decode_record(payload)?;
            Ok(Some(Command::PresenceUpdate {
                participant,
                record,
            }))
        }
        PRESENCE_REQUEST => {
            let params: Vec<&str> = rest.split_whitespace().collect();
            if params.len() != 1 {
                return Err(WireError::ParameterCount {
                    kind: PRESENCE_REQUEST,
                    expected: 1,
                    found: params.len(),
                });
            }
            Ok(Some(Command::PresenceRequest {
                participant: parse_participant(params[0])?,
            }))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use similar_asserts::assert_eq;

    #[fixture]
    fn record() -> PresenceRecord {
        PresenceRecord {
            character_name: "Joko Norn".to_string(),
            profession: 2,
            map_id: 15,
            map_name: "Queensdale".to_string(),
            region_id: 4,
            region_name: "Kryta".to_string(),
            continent_id: 1,
            continent_name: "Tyria".to_string(),
            world_id: 1001,
            world_name: "Anvil Rock".to_string(),
            team_color_id: 9,
            commander: true,
            character_continent_position: DVec2::new(11648.125, 12864.5),
            waypoint_id: 1,
            waypoint_name: "Shaemoor Waypoint".to_string(),
            waypoint_continent_position: DVec2::new(0.1 + 0.2, -1e-300),
        }
    }

    #[rstest]
    fn update_round_trip(record: PresenceRecord) {
        let text = encode_update(ParticipantId(12), &record).expect("failed to encode");
        let command = parse_command(&text).expect("failed to parse").expect("known command");
        assert_eq!(
            command,
            Command::PresenceUpdate {
                participant: ParticipantId(12),
                record,
            }
        );
    }

    #[test]
    fn offline_record_round_trip() {
        let text = encode_update(ParticipantId(1), &PresenceRecord::default()).unwrap();
        assert_eq!(
            parse_command(&text).unwrap(),
            Some(Command::PresenceUpdate {
                participant: ParticipantId(1),
                record: PresenceRecord::default(),
            })
        );
    }

    #[test]
    fn request_round_trip() {
        assert_eq!(encode_request(ParticipantId(7)), "REQUESTGW2INFO 7");
        assert_eq!(
            parse_command("REQUESTGW2INFO 7").unwrap(),
            Some(Command::PresenceRequest {
                participant: ParticipantId(7)
            })
        );
    }

    #[rstest]
    fn payload_uses_short_keys(record: PresenceRecord) {
        let payload = encode_record(&record).unwrap();
        assert!(payload.contains(r#""n":"Joko Norn""#), "{payload}");
        assert!(payload.contains(r#""pos":[11648.125,12864.5]"#), "{payload}");
        assert!(!payload.contains("character_name"));
    }

    #[test]
    fn unknown_kind_is_ignored() {
        assert!(matches!(parse_command("SOMETHINGNEW 1 2 3"), Ok(None)));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::update_without_params("GW2INFO")]
    #[case::update_without_payload("GW2INFO 5")]
    #[case::update_bad_participant("GW2INFO five {}")]
    #[case::request_without_params("REQUESTGW2INFO")]
    #[case::request_extra_params("REQUESTGW2INFO 5 6")]
    #[case::request_out_of_range("REQUESTGW2INFO 70000")]
    fn malformed_envelopes(#[case] text: &str) {
        assert!(parse_command(text).is_err(), "{text:?} should be rejected");
    }

    #[rstest]
    fn truncated_payload_is_rejected(record: PresenceRecord) {
        let text = encode_update(ParticipantId(3), &record).unwrap();
        for cut in [text.len() - 1, text.len() / 2, "GW2INFO 3 {".len()] {
            assert!(
                matches!(parse_command(&text[..cut]), Err(WireError::Payload(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn garbled_payload_is_rejected() {
        assert!(matches!(
            parse_command(r#"GW2INFO 3 {"n": 5}"#),
            Err(WireError::Payload(_))
        ));
        assert!(matches!(
            parse_command("GW2INFO 3 not json at all"),
            Err(WireError::Payload(_))
        ));
    }

    #[rstest]
    fn oversized_update_is_not_encoded(mut record: PresenceRecord) {
        record.character_name = "x".repeat(MAX_COMMAND_LEN);
        assert!(matches!(
            encode_update(ParticipantId(1), &record),
            Err(WireError::TooLong(_))
        ));
    }
}
