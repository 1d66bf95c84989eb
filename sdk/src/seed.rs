//! The Tree seed wire form (spec.md §6.3 / §4.4.2).

use crate::codec::{decode_timestamp_ms, decode_value, encode_timestamp_ms, encode_value, CodecError, CodecResult, Reader, Writer};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One replicated Tree mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Task {
    AddBranch = 0,
    AddLeaf = 1,
    RemoveBranch = 2,
    RemoveLeaf = 3,
    RenameBranch = 4,
    RenameLeaf = 5,
    SetLeaf = 6,
}

impl Task {
    fn from_tag(tag: u8) -> Option<Task> {
        Some(match tag {
            0 => Task::AddBranch,
            1 => Task::AddLeaf,
            2 => Task::RemoveBranch,
            3 => Task::RemoveLeaf,
            4 => Task::RenameBranch,
            5 => Task::RenameLeaf,
            6 => Task::SetLeaf,
            _ => return None,
        })
    }
}

/// `(task, args, timestamp, origin Tree UUID)`. `args`' meaning depends on
/// `task`: `AddBranch`: `[path]`; `AddLeaf`: `[path]` or `[path, value]`;
/// `Remove*`: `[path]`; `Rename*`: `[path, new_name]`; `SetLeaf`: `[path, value]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Seed {
    pub task: Task,
    pub args: Vec<Value>,
    pub timestamp_ms: i64,
    pub origin: Uuid,
}

impl Seed {
    pub fn new(task: Task, args: Vec<Value>, timestamp_ms: i64, origin: Uuid) -> Self {
        Seed {
            task,
            args,
            timestamp_ms,
            origin,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_u8(self.task as u8);
        w.write_u32(self.args.len() as u32);
        for v in &self.args {
            encode_value(w, v);
        }
        encode_timestamp_ms(w, self.timestamp_ms);
        // Fixed 16-byte trailer (spec.md §6.3), not length-prefixed like a
        // general byte buffer: the reader always knows its size up front.
        w.write_raw(self.origin.as_bytes());
    }

    pub fn decode(r: &mut Reader) -> CodecResult<Seed> {
        let tag = r.read_u8()?;
        let task = Task::from_tag(tag).ok_or(CodecError::UnknownTag(tag))?;
        let n_args = r.read_u32()? as usize;
        let mut args = Vec::with_capacity(n_args);
        for _ in 0..n_args {
            args.push(decode_value(r)?);
        }
        let timestamp_ms = decode_timestamp_ms(r)?;
        let origin_bytes = r.read_raw(16)?;
        let origin = Uuid::from_slice(&origin_bytes).map_err(|_| CodecError::UnknownTag(0xFF))?;
        Ok(Seed {
            task,
            args,
            timestamp_ms,
            origin,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Seed> {
        let mut r = Reader::new(bytes);
        Seed::decode(&mut r)
    }
}

/// Seeds are self-delimiting (every field and arg is itself length-prefixed
/// or fixed-size), so a list is just a u32 count followed by each one's
/// encoding, mirroring `codec::encode_value_list`. Used to ship a Tree's
/// seed list as a single Link buffer (spec.md §4.4.2 "Transport ships the
/// list").
pub fn encode_seed_list(w: &mut Writer, seeds: &[Seed]) {
    w.write_u32(seeds.len() as u32);
    for seed in seeds {
        seed.encode(w);
    }
}

pub fn decode_seed_list(r: &mut Reader) -> CodecResult<Vec<Seed>> {
    let len = r.read_u32()? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(Seed::decode(r)?);
    }
    Ok(out)
}

pub fn seed_list_to_bytes(seeds: &[Seed]) -> Vec<u8> {
    let mut w = Writer::new();
    encode_seed_list(&mut w, seeds);
    w.into_bytes()
}

pub fn seed_list_from_bytes(bytes: &[u8]) -> CodecResult<Vec<Seed>> {
    let mut r = Reader::new(bytes);
    decode_seed_list(&mut r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_round_trips_through_the_wire_form() {
        let seed = Seed::new(
            Task::SetLeaf,
            vec![Value::from_string("/a/leaf"), Value::from_string("hello")],
            1234,
            Uuid::new_v4(),
        );
        let bytes = seed.to_bytes();
        let decoded = Seed::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, seed);
    }

    #[test]
    fn seed_list_round_trips() {
        let seeds = vec![
            Seed::new(Task::AddBranch, vec![Value::from_string("/objects/cam1")], 10, Uuid::new_v4()),
            Seed::new(Task::AddLeaf, vec![Value::from_string("/objects/cam1/type"), Value::from_string("camera")], 11, Uuid::new_v4()),
        ];
        let bytes = seed_list_to_bytes(&seeds);
        assert_eq!(seed_list_from_bytes(&bytes).unwrap(), seeds);
    }

    #[test]
    fn empty_seed_list_round_trips() {
        let bytes = seed_list_to_bytes(&[]);
        assert!(seed_list_from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn unknown_task_tag_is_rejected() {
        let mut w = Writer::new();
        w.write_u8(0xAB);
        w.write_u32(0);
        encode_timestamp_ms(&mut w, 0);
        w.write_raw(Uuid::new_v4().as_bytes());
        let bytes = w.into_bytes();
        assert!(Seed::from_bytes(&bytes).is_err());
    }
}
