//! WebSocket protocol message definitions
//! These are the wire types for client-server communication
//!
//! Every message is a flat JSON object with a string `type` discriminator.
//! Inbound parsing is lenient per field: a missing, null or mistyped field
//! decodes as 0/false/empty instead of rejecting the whole message.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Assigns the local entity id and the server time baseline
    Welcome {
        #[serde(default, deserialize_with = "lenient_u32")]
        id: u32,
        #[serde(default, rename = "serverTime", deserialize_with = "lenient_u64")]
        server_time: u64,
    },

    /// Another player joined the room
    JoinBroadcast {
        #[serde(default, deserialize_with = "lenient_u32")]
        id: u32,
        #[serde(default, rename = "charId", deserialize_with = "lenient_string")]
        char_id: String,
    },

    /// Authoritative entity state
    State(StateUpdate),

    /// Shot fired by someone (visual tracer only)
    Shot(ShotTrace),

    /// Damage dealt to an entity
    Damage(DamageReport),

    /// Entity respawned
    Respawn(RespawnInfo),

    /// Entity left the room
    Leave {
        #[serde(default, deserialize_with = "lenient_u32")]
        id: u32,
    },

    /// Session is over
    GameOver {
        #[serde(default)]
        results: Value,
    },

    /// Any type this client does not understand
    #[serde(other)]
    Unknown,
}

/// Core synchronization message
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StateUpdate {
    #[serde(deserialize_with = "lenient_u32")]
    pub id: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
    #[serde(deserialize_with = "lenient_bool")]
    pub facing: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub anim: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phase: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub vx: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub vy: f64,
    #[serde(rename = "onGround", deserialize_with = "lenient_bool")]
    pub on_ground: bool,
    #[serde(deserialize_with = "lenient_u64")]
    pub seq: u64,
    #[serde(rename = "charId", deserialize_with = "lenient_string")]
    pub char_id: String,
    /// Server timestamp (`serverTime` or `srvTS`), 0 when absent
    #[serde(rename = "serverTime", deserialize_with = "lenient_u64")]
    pub server_time: u64,
}

/// Shot by another entity
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShotTrace {
    #[serde(deserialize_with = "lenient_u32")]
    pub attacker: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub ox: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub oy: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub dx: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub dy: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub range: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DamageReport {
    #[serde(deserialize_with = "lenient_u32")]
    pub victim: u32,
    #[serde(deserialize_with = "lenient_i32")]
    pub damage: i32,
    #[serde(deserialize_with = "lenient_bool")]
    pub dead: bool,
    /// Knockback impulse
    #[serde(deserialize_with = "lenient_f64")]
    pub kx: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub ky: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RespawnInfo {
    #[serde(deserialize_with = "lenient_u32")]
    pub id: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
    #[serde(rename = "charId", deserialize_with = "lenient_string")]
    pub char_id: String,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Local entity state, sent at a fixed cadence
    State(StateReport),

    /// Shot fired locally, sent immediately
    Shot(ShotReport),

    /// Intentional disconnect
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub facing: bool,
    #[serde(rename = "onGround")]
    pub on_ground: bool,
    pub anim: String,
    pub phase: String,
    /// Client timestamp (ms)
    pub ts: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotReport {
    pub ox: f64,
    pub oy: f64,
    pub dx: f64,
    pub dy: f64,
    pub range: f64,
    pub damage: i32,
    pub ts: u64,
    pub seq: u64,
    /// Weapon identifier ("pistol", "shotgun", ...)
    pub weapon: String,
}

/// Codec errors for inbound frames
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Message is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Message has no string `type` field")]
    MissingType,

    #[error("Message could not be decoded: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Decode one inbound text frame.
///
/// Unknown message types decode to [`ServerMsg::Unknown`]; only frames that
/// cannot be interpreted at all are errors.
pub fn decode(text: &str) -> Result<ServerMsg, ProtocolError> {
    let mut value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let object = value.as_object_mut().ok_or(ProtocolError::NotAnObject)?;
    if !object.get("type").is_some_and(Value::is_string) {
        return Err(ProtocolError::MissingType);
    }
    merge_server_time(object);
    ServerMsg::deserialize(value).map_err(ProtocolError::Malformed)
}

/// Fold the legacy `srvTS` key into `serverTime`, keeping whichever is non-zero
fn merge_server_time(object: &mut Map<String, Value>) {
    let Some(legacy) = object.remove("srvTS") else {
        return;
    };
    let current = object.get("serverTime").map_or(0, value_to_u64);
    if current == 0 {
        object.insert("serverTime".to_string(), legacy);
    }
}

/// Encode one outbound message as a JSON text frame
pub fn encode(msg: &ClientMsg) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0))
}

fn value_to_u64(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0 && v.is_finite()).map(|v| v as u64))
        .unwrap_or(0)
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value_to_u64(&value))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let raw = lenient_u64(d)?;
    Ok(u32::try_from(raw).unwrap_or(0))
}

fn lenient_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
        .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .unwrap_or(0))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_bool().unwrap_or(false))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_str().map(str::to_owned).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_welcome() {
        let msg = decode(r#"{"type":"welcome","id":7,"serverTime":123456}"#).unwrap();
        assert_eq!(
            msg,
            ServerMsg::Welcome {
                id: 7,
                server_time: 123456
            }
        );
    }

    #[test]
    fn decodes_full_state() {
        let msg = decode(
            r#"{"type":"state","id":3,"x":10.5,"y":-4,"facing":true,"anim":"run",
                "phase":"idle","vx":120,"vy":0,"onGround":true,"seq":42,
                "charId":"ninja","serverTime":99}"#,
        )
        .unwrap();
        let ServerMsg::State(state) = msg else {
            panic!("expected state, got {msg:?}");
        };
        assert_eq!(state.id, 3);
        assert_eq!(state.x, 10.5);
        assert_eq!(state.y, -4.0);
        assert!(state.facing);
        assert_eq!(state.anim, "run");
        assert_eq!(state.phase, "idle");
        assert_eq!(state.vx, 120.0);
        assert!(state.on_ground);
        assert_eq!(state.seq, 42);
        assert_eq!(state.char_id, "ninja");
        assert_eq!(state.server_time, 99);
    }

    #[test]
    fn missing_and_mistyped_fields_default() {
        let msg = decode(r#"{"type":"state","id":"oops","x":null,"facing":"yes","seq":-3}"#)
            .unwrap();
        let ServerMsg::State(state) = msg else {
            panic!("expected state");
        };
        assert_eq!(state, StateUpdate::default());
    }

    #[test]
    fn server_time_alias() {
        let ServerMsg::State(state) = decode(r#"{"type":"state","id":1,"srvTS":500}"#).unwrap()
        else {
            panic!("expected state");
        };
        assert_eq!(state.server_time, 500);
    }

    #[test]
    fn both_server_time_keys_decode() {
        let state_time = |text: &str| match decode(text).unwrap() {
            ServerMsg::State(state) => state.server_time,
            other => panic!("expected state, got {other:?}"),
        };
        assert_eq!(
            state_time(r#"{"type":"state","id":2,"x":5,"seq":1,"serverTime":10,"srvTS":10}"#),
            10
        );
        assert_eq!(
            state_time(r#"{"type":"state","id":2,"serverTime":0,"srvTS":700}"#),
            700
        );
        assert_eq!(
            state_time(r#"{"type":"state","id":2,"srvTS":0,"serverTime":40}"#),
            40
        );

        let welcome = decode(r#"{"type":"welcome","id":1,"serverTime":9,"srvTS":3}"#).unwrap();
        assert_eq!(
            welcome,
            ServerMsg::Welcome {
                id: 1,
                server_time: 9
            }
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        assert_eq!(
            decode(r#"{"type":"chat","text":"hi"}"#).unwrap(),
            ServerMsg::Unknown
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode("not json"), Err(ProtocolError::InvalidJson(_))));
        assert!(matches!(decode("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(decode(r#"{"id":1}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(decode(r#"{"type":5}"#), Err(ProtocolError::MissingType)));
    }

    #[test]
    fn decodes_damage_and_game_over() {
        let msg = decode(r#"{"type":"damage","victim":2,"damage":50.0,"dead":false,"kx":-30}"#)
            .unwrap();
        assert_eq!(
            msg,
            ServerMsg::Damage(DamageReport {
                victim: 2,
                damage: 50,
                dead: false,
                kx: -30.0,
                ky: 0.0,
            })
        );

        let msg = decode(r#"{"type":"game_over","results":{"winner":2}}"#).unwrap();
        let ServerMsg::GameOver { results } = msg else {
            panic!("expected game over");
        };
        assert_eq!(results["winner"], 2);
    }

    #[test]
    fn encodes_outbound_field_names() {
        let json = encode(&ClientMsg::State(StateReport {
            x: 1.0,
            y: 2.0,
            vx: 3.0,
            vy: 4.0,
            facing: false,
            on_ground: true,
            anim: "walk".to_string(),
            phase: String::new(),
            ts: 10,
            seq: 11,
        }))
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["onGround"], true);
        assert_eq!(value["seq"], 11);

        let leave: Value = serde_json::from_str(&encode(&ClientMsg::Leave).unwrap()).unwrap();
        assert_eq!(leave, serde_json::json!({"type": "leave"}));
    }
}
