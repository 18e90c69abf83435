//! Reader for the pre-RLP block-metadata layout. Migration only.
//!
//! Early index entries were written as a Java object serialization stream
//! of a `java.util.ArrayList` holding `BlockInfo` objects:
//!
//! ```text
//! BlockInfo { mainChain: boolean, cummDifficulty: java.math.BigInteger, hash: byte[] }
//! ```
//!
//! The reader understands the subset of the stream protocol those writers
//! produced (class descriptors, objects, strings, arrays, block data and
//! back-references) and rejects everything else. Records serialized under
//! the retired class name are remapped onto the current record type before
//! conversion. Nothing in this crate writes this format.

use std::rc::Rc;

use num_bigint::BigUint;

use kiln_core::error::CodecError;
use kiln_core::types::{BlockMetadata, Hash256};

/// Record class name used before the store moved packages.
pub const RETIRED_RECORD_CLASS: &str = "org.aion.db.a0.AionBlockStore$BlockInfo";

/// Record class name the retired name maps onto.
pub const RECORD_CLASS: &str = "org.aion.zero.impl.db.AionBlockStore$BlockInfo";

/// Class-name rewrites applied to records before conversion.
const CLASS_REMAP: &[(&str, &str)] = &[(RETIRED_RECORD_CLASS, RECORD_CLASS)];

const LIST_CLASS: &str = "java.util.ArrayList";
const BIG_INTEGER_CLASS: &str = "java.math.BigInteger";

const STREAM_MAGIC: u16 = 0xACED;
const STREAM_VERSION: u16 = 5;

const TC_NULL: u8 = 0x70;
const TC_REFERENCE: u8 = 0x71;
const TC_CLASSDESC: u8 = 0x72;
const TC_OBJECT: u8 = 0x73;
const TC_STRING: u8 = 0x74;
const TC_ARRAY: u8 = 0x75;
const TC_BLOCKDATA: u8 = 0x77;
const TC_ENDBLOCKDATA: u8 = 0x78;
const TC_BLOCKDATALONG: u8 = 0x7A;
const TC_LONGSTRING: u8 = 0x7C;

const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

const SC_WRITE_METHOD: u8 = 0x01;
const SC_SERIALIZABLE: u8 = 0x02;
const SC_EXTERNALIZABLE: u8 = 0x04;

/// Nesting bound for objects, arrays and superclass chains.
const MAX_DEPTH: usize = 64;

type Result<T> = std::result::Result<T, CodecError>;

fn malformed(msg: impl Into<String>) -> CodecError {
    CodecError::Legacy(msg.into())
}

/// Decode a legacy metadata list.
pub fn decode(bytes: &[u8]) -> Result<Vec<BlockMetadata>> {
    let mut reader = StreamReader::new(bytes);
    reader.stream_header()?;
    let root = reader.content()?;
    if !reader.buf.is_empty() {
        return Err(malformed(format!("{} trailing bytes", reader.buf.len())));
    }

    let list = match root {
        Value::Object(obj) if obj.class_name == LIST_CLASS => obj,
        Value::Object(obj) => {
            return Err(malformed(format!(
                "unexpected root class {}",
                obj.class_name
            )));
        }
        _ => return Err(malformed("root is not an object")),
    };

    let mut records = Vec::new();
    for item in &list.annotations {
        match item {
            // The element count written by ArrayList.writeObject.
            Value::BlockData(_) => {}
            Value::Object(obj) => records.push(record_from_object(obj)?),
            _ => return Err(malformed("unexpected list element")),
        }
    }

    if let Some(Value::Int(size)) = list.field("size") {
        if *size != records.len() as i64 {
            return Err(malformed(format!(
                "list size {size} but {} records",
                records.len()
            )));
        }
    }
    Ok(records)
}

fn remap_class(name: &str) -> &str {
    CLASS_REMAP
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

fn record_from_object(obj: &JavaObject) -> Result<BlockMetadata> {
    let class = remap_class(&obj.class_name);
    if class != RECORD_CLASS {
        return Err(malformed(format!("unexpected record class {}", obj.class_name)));
    }

    let hash = match obj.field("hash") {
        Some(Value::Bytes(bytes)) => Hash256::from_slice(bytes)?,
        _ => return Err(malformed("record without hash")),
    };
    let cumulative_difficulty = match obj.field("cummDifficulty") {
        Some(Value::Object(big)) if big.class_name == BIG_INTEGER_CLASS => big_integer(big)?,
        _ => return Err(malformed("record without cumulative difficulty")),
    };
    let main_chain = match obj.field("mainChain") {
        Some(Value::Bool(flag)) => *flag,
        _ => return Err(malformed("record without main-chain flag")),
    };

    Ok(BlockMetadata {
        hash,
        cumulative_difficulty,
        main_chain,
    })
}

fn big_integer(obj: &JavaObject) -> Result<BigUint> {
    let signum = match obj.field("signum") {
        Some(Value::Int(s)) => *s,
        _ => return Err(malformed("BigInteger without signum")),
    };
    let magnitude = match obj.field("magnitude") {
        Some(Value::Bytes(m)) => m,
        _ => return Err(malformed("BigInteger without magnitude")),
    };
    match signum {
        0 => Ok(BigUint::default()),
        1 => Ok(BigUint::from_bytes_be(magnitude)),
        _ => Err(malformed(format!("negative cumulative difficulty (signum {signum})"))),
    }
}

// --- Stream model ---

#[allow(dead_code)]
#[derive(Debug, Clone)]
enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    Array(Rc<[Value]>),
    Object(Rc<JavaObject>),
    BlockData(Rc<[u8]>),
}

#[derive(Debug)]
struct JavaObject {
    class_name: String,
    /// Field values, superclass fields first.
    fields: Vec<(String, Value)>,
    /// Custom data written by `writeObject` methods.
    annotations: Vec<Value>,
}

impl JavaObject {
    fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug)]
struct ClassDesc {
    name: String,
    flags: u8,
    fields: Vec<FieldDesc>,
    super_class: Option<Rc<ClassDesc>>,
}

#[derive(Debug)]
struct FieldDesc {
    type_code: u8,
    name: String,
}

#[derive(Debug)]
enum Handle {
    Class(Rc<ClassDesc>),
    Value(Value),
    /// Assigned but still being read.
    Pending,
}

struct StreamReader<'a> {
    buf: &'a [u8],
    handles: Vec<Handle>,
    depth: usize,
}

impl<'a> StreamReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            handles: Vec::new(),
            depth: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(malformed("unexpected end of stream"));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn peek(&self) -> Result<u8> {
        self.buf
            .first()
            .copied()
            .ok_or_else(|| malformed("unexpected end of stream"))
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    fn utf(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn long_utf(&mut self) -> Result<String> {
        let len = usize::try_from(self.u64()?).map_err(|_| malformed("string too long"))?;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn stream_header(&mut self) -> Result<()> {
        if self.u16()? != STREAM_MAGIC {
            return Err(malformed("bad stream magic"));
        }
        let version = self.u16()?;
        if version != STREAM_VERSION {
            return Err(malformed(format!("unsupported stream version {version}")));
        }
        Ok(())
    }

    fn assign(&mut self, handle: Handle) -> usize {
        self.handles.push(handle);
        self.handles.len() - 1
    }

    fn reference(&mut self) -> Result<&Handle> {
        let raw = self.u32()?;
        let index = raw
            .checked_sub(BASE_WIRE_HANDLE)
            .ok_or_else(|| malformed(format!("bad handle {raw:#x}")))? as usize;
        match self.handles.get(index) {
            Some(Handle::Pending) => Err(malformed("cyclic reference")),
            Some(handle) => Ok(handle),
            None => Err(malformed(format!("unknown handle {raw:#x}"))),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(malformed("nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// One content element: an object-like value or a block of raw data.
    fn content(&mut self) -> Result<Value> {
        match self.u8()? {
            TC_NULL => Ok(Value::Null),
            TC_REFERENCE => match self.reference()? {
                Handle::Value(value) => Ok(value.clone()),
                _ => Err(malformed("reference to a class descriptor used as a value")),
            },
            TC_OBJECT => {
                self.enter()?;
                let value = self.object();
                self.leave();
                value
            }
            TC_ARRAY => {
                self.enter()?;
                let value = self.array();
                self.leave();
                value
            }
            TC_STRING => {
                let s = self.utf()?;
                Ok(self.string(s))
            }
            TC_LONGSTRING => {
                let s = self.long_utf()?;
                Ok(self.string(s))
            }
            TC_BLOCKDATA => {
                let len = self.u8()? as usize;
                Ok(Value::BlockData(Rc::from(self.take(len)?)))
            }
            TC_BLOCKDATALONG => {
                let len = self.u32()? as usize;
                Ok(Value::BlockData(Rc::from(self.take(len)?)))
            }
            tc => Err(malformed(format!("unsupported stream element {tc:#04x}"))),
        }
    }

    fn string(&mut self, s: String) -> Value {
        let value = Value::String(Rc::from(s));
        self.assign(Handle::Value(value.clone()));
        value
    }

    fn class_desc(&mut self) -> Result<Option<Rc<ClassDesc>>> {
        match self.u8()? {
            TC_NULL => Ok(None),
            TC_REFERENCE => match self.reference()? {
                Handle::Class(desc) => Ok(Some(Rc::clone(desc))),
                _ => Err(malformed("reference to a value used as a class descriptor")),
            },
            TC_CLASSDESC => {
                self.enter()?;
                let desc = self.new_class_desc();
                self.leave();
                desc.map(Some)
            }
            tc => Err(malformed(format!("expected class descriptor, got {tc:#04x}"))),
        }
    }

    fn new_class_desc(&mut self) -> Result<Rc<ClassDesc>> {
        let slot = self.assign(Handle::Pending);
        let name = self.utf()?;
        let _serial_version_uid = self.u64()?;
        let flags = self.u8()?;
        if flags & SC_EXTERNALIZABLE != 0 {
            return Err(malformed(format!("externalizable class {name}")));
        }

        let count = self.u16()?;
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let type_code = self.u8()?;
            let field_name = self.utf()?;
            match type_code {
                b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {}
                b'L' | b'[' => self.type_string()?,
                other => return Err(malformed(format!("bad field type {other:#04x}"))),
            }
            fields.push(FieldDesc {
                type_code,
                name: field_name,
            });
        }

        // Class annotations carry nothing we need.
        self.annotations()?;
        let super_class = self.class_desc()?;

        let desc = Rc::new(ClassDesc {
            name,
            flags,
            fields,
            super_class,
        });
        self.handles[slot] = Handle::Class(Rc::clone(&desc));
        Ok(desc)
    }

    fn type_string(&mut self) -> Result<()> {
        match self.u8()? {
            TC_STRING => {
                let s = self.utf()?;
                self.string(s);
                Ok(())
            }
            TC_REFERENCE => match self.reference()? {
                Handle::Value(Value::String(_)) => Ok(()),
                _ => Err(malformed("field type reference is not a string")),
            },
            tc => Err(malformed(format!("expected field type string, got {tc:#04x}"))),
        }
    }

    fn annotations(&mut self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            if self.peek()? == TC_ENDBLOCKDATA {
                self.take(1)?;
                return Ok(items);
            }
            items.push(self.content()?);
        }
    }

    fn object(&mut self) -> Result<Value> {
        let desc = self
            .class_desc()?
            .ok_or_else(|| malformed("object without class descriptor"))?;
        let slot = self.assign(Handle::Pending);

        // Class data is laid out from the topmost serializable superclass down.
        let mut hierarchy = Vec::new();
        let mut current = Some(Rc::clone(&desc));
        while let Some(class) = current {
            current = class.super_class.clone();
            hierarchy.push(class);
        }
        hierarchy.reverse();

        let mut fields = Vec::new();
        let mut annotations = Vec::new();
        for class in &hierarchy {
            if class.flags & SC_SERIALIZABLE == 0 {
                return Err(malformed(format!("class {} is not serializable", class.name)));
            }
            for field in &class.fields {
                let value = self.field_value(field.type_code)?;
                fields.push((field.name.clone(), value));
            }
            if class.flags & SC_WRITE_METHOD != 0 {
                annotations.extend(self.annotations()?);
            }
        }

        let value = Value::Object(Rc::new(JavaObject {
            class_name: desc.name.clone(),
            fields,
            annotations,
        }));
        self.handles[slot] = Handle::Value(value.clone());
        Ok(value)
    }

    fn array(&mut self) -> Result<Value> {
        let desc = self
            .class_desc()?
            .ok_or_else(|| malformed("array without class descriptor"))?;
        let slot = self.assign(Handle::Pending);

        let len = self.u32()? as i32;
        let len = usize::try_from(len).map_err(|_| malformed("negative array length"))?;
        // Every element takes at least one byte.
        if len > self.buf.len() {
            return Err(malformed("array longer than stream"));
        }

        let element = desc.name.as_bytes().get(1).copied();
        let value = match element {
            Some(b'B') => Value::Bytes(Rc::from(self.take(len)?)),
            Some(type_code) => {
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.field_value(type_code)?);
                }
                Value::Array(Rc::from(items))
            }
            None => return Err(malformed(format!("bad array class {}", desc.name))),
        };
        self.handles[slot] = Handle::Value(value.clone());
        Ok(value)
    }

    fn field_value(&mut self, type_code: u8) -> Result<Value> {
        Ok(match type_code {
            b'Z' => Value::Bool(self.u8()? != 0),
            b'B' => Value::Int(self.u8()? as i8 as i64),
            b'C' => Value::Int(self.u16()? as i64),
            b'S' => Value::Int(self.u16()? as i16 as i64),
            b'I' => Value::Int(self.u32()? as i32 as i64),
            b'J' => Value::Int(self.u64()? as i64),
            b'F' => Value::Float(f32::from_bits(self.u32()?) as f64),
            b'D' => Value::Float(f64::from_bits(self.u64()?)),
            b'L' | b'[' => self.content()?,
            other => return Err(malformed(format!("bad value type {other:#04x}"))),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::codec::{self, MetadataFormat};

    /// Writes the stream a Java `ObjectOutputStream` produces for an
    /// `ArrayList<BlockInfo>`, handle numbering included.
    pub(crate) struct JavaStream {
        out: Vec<u8>,
        next_handle: u32,
        known: HashMap<String, u32>,
    }

    type SuperWriter = fn(&mut JavaStream);

    impl JavaStream {
        fn new() -> Self {
            let mut out = Vec::new();
            out.extend_from_slice(&STREAM_MAGIC.to_be_bytes());
            out.extend_from_slice(&STREAM_VERSION.to_be_bytes());
            Self {
                out,
                next_handle: BASE_WIRE_HANDLE,
                known: HashMap::new(),
            }
        }

        fn assign(&mut self, key: Option<String>) {
            if let Some(key) = key {
                self.known.insert(key, self.next_handle);
            }
            self.next_handle += 1;
        }

        fn utf(&mut self, s: &str) {
            self.out.extend_from_slice(&(s.len() as u16).to_be_bytes());
            self.out.extend_from_slice(s.as_bytes());
        }

        fn i32(&mut self, v: i32) {
            self.out.extend_from_slice(&v.to_be_bytes());
        }

        fn back_reference(&mut self, key: &str) -> bool {
            match self.known.get(key) {
                Some(handle) => {
                    let handle = *handle;
                    self.out.push(TC_REFERENCE);
                    self.out.extend_from_slice(&handle.to_be_bytes());
                    true
                }
                None => false,
            }
        }

        fn type_string(&mut self, sig: &str) {
            let key = format!("str:{sig}");
            if !self.back_reference(&key) {
                self.out.push(TC_STRING);
                self.assign(Some(key));
                self.utf(sig);
            }
        }

        fn null(&mut self) {
            self.out.push(TC_NULL);
        }

        fn class_desc(
            &mut self,
            name: &str,
            suid: i64,
            flags: u8,
            fields: &[(u8, &str, &str)],
            super_desc: SuperWriter,
        ) {
            let key = format!("class:{name}");
            if self.back_reference(&key) {
                return;
            }
            self.out.push(TC_CLASSDESC);
            self.assign(Some(key));
            self.utf(name);
            self.out.extend_from_slice(&suid.to_be_bytes());
            self.out.push(flags);
            self.out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
            for (type_code, field_name, sig) in fields {
                self.out.push(*type_code);
                self.utf(field_name);
                if *type_code == b'L' || *type_code == b'[' {
                    self.type_string(sig);
                }
            }
            self.out.push(TC_ENDBLOCKDATA);
            super_desc(self);
        }

        fn byte_array(&mut self, bytes: &[u8]) {
            self.out.push(TC_ARRAY);
            self.class_desc("[B", -5984413125824719648, SC_SERIALIZABLE, &[], |w| w.null());
            self.assign(None);
            self.i32(bytes.len() as i32);
            self.out.extend_from_slice(bytes);
        }

        fn big_integer(&mut self, value: &BigUint) {
            self.out.push(TC_OBJECT);
            self.class_desc(
                BIG_INTEGER_CLASS,
                -8287574255936472291,
                SC_SERIALIZABLE | SC_WRITE_METHOD,
                &[
                    (b'I', "bitCount", ""),
                    (b'I', "bitLength", ""),
                    (b'I', "firstNonzeroByteNum", ""),
                    (b'I', "lowestSetBit", ""),
                    (b'I', "signum", ""),
                    (b'[', "magnitude", "[B"),
                ],
                |w| {
                    w.class_desc(
                        "java.lang.Number",
                        -8742448824652078965,
                        SC_SERIALIZABLE,
                        &[],
                        |w| w.null(),
                    )
                },
            );
            self.assign(None);
            let zero = *value == BigUint::default();
            self.i32(-1);
            self.i32(-1);
            self.i32(-2);
            self.i32(-2);
            self.i32(if zero { 0 } else { 1 });
            let magnitude = if zero { Vec::new() } else { value.to_bytes_be() };
            self.byte_array(&magnitude);
            self.out.push(TC_ENDBLOCKDATA);
        }

        fn block_info(&mut self, class_name: &str, record: &BlockMetadata) {
            self.out.push(TC_OBJECT);
            self.class_desc(
                class_name,
                7279277944605144671,
                SC_SERIALIZABLE,
                &[
                    (b'Z', "mainChain", ""),
                    (b'L', "cummDifficulty", "Ljava/math/BigInteger;"),
                    (b'[', "hash", "[B"),
                ],
                |w| w.null(),
            );
            self.assign(None);
            self.out.push(record.main_chain as u8);
            self.big_integer(&record.cumulative_difficulty);
            self.byte_array(record.hash.as_bytes());
        }

        /// Full stream for `records`, serialized under `class_name`.
        pub(crate) fn array_list(class_name: &str, records: &[BlockMetadata]) -> Vec<u8> {
            let mut w = Self::new();
            w.out.push(TC_OBJECT);
            w.class_desc(
                LIST_CLASS,
                8683452581122892189,
                SC_SERIALIZABLE | SC_WRITE_METHOD,
                &[(b'I', "size", "")],
                |w| w.null(),
            );
            w.assign(None);
            w.i32(records.len() as i32);
            w.out.push(TC_BLOCKDATA);
            w.out.push(4);
            w.i32(records.len() as i32);
            for record in records {
                w.block_info(class_name, record);
            }
            w.out.push(TC_ENDBLOCKDATA);
            w.out
        }
    }

    fn sample_records() -> Vec<BlockMetadata> {
        vec![
            BlockMetadata::new(Hash256([0x11; 32]), BigUint::from(2_000_000u64), true),
            BlockMetadata::new(Hash256([0x22; 32]), BigUint::from(1_999_999u64), false),
            BlockMetadata::new(Hash256([0x33; 32]), BigUint::default(), false),
        ]
    }

    #[test]
    fn retired_class_name_is_remapped() {
        let records = sample_records();
        let bytes = JavaStream::array_list(RETIRED_RECORD_CLASS, &records);
        assert_eq!(decode(&bytes).unwrap(), records);
    }

    #[test]
    fn current_class_name_is_accepted() {
        let records = sample_records();
        let bytes = JavaStream::array_list(RECORD_CLASS, &records);
        assert_eq!(decode(&bytes).unwrap(), records);
    }

    #[test]
    fn empty_list() {
        let bytes = JavaStream::array_list(RECORD_CLASS, &[]);
        assert_eq!(decode(&bytes).unwrap(), vec![]);
    }

    #[test]
    fn stream_header_is_checked() {
        let mut bytes = JavaStream::array_list(RECORD_CLASS, &sample_records());
        bytes[3] = 0x04;
        assert!(matches!(decode(&bytes), Err(CodecError::Legacy(_))));
        assert!(matches!(decode(&[0xC0]), Err(CodecError::Legacy(_))));
    }

    #[test]
    fn unknown_record_class_is_rejected() {
        let bytes = JavaStream::array_list("com.example.Other", &sample_records());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("com.example.Other"), "got {err}");
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let bytes = JavaStream::array_list(RECORD_CLASS, &sample_records());
        for cut in [5, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode(&bytes[..cut]).is_err(), "cut at {cut} decoded");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = JavaStream::array_list(RECORD_CLASS, &sample_records());
        bytes.push(TC_NULL);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn negative_difficulty_is_rejected() {
        let mut bytes = JavaStream::array_list(RECORD_CLASS, &sample_records()[..1]);
        // signum is the last int before the magnitude array, which opens
        // with TC_ARRAY and the first "[B" class descriptor.
        let marker = [TC_ARRAY, TC_CLASSDESC, 0x00, 0x02, b'[', b'B'];
        let pos = bytes.windows(marker.len()).position(|w| w == marker).unwrap();
        bytes[pos - 4..pos].copy_from_slice(&(-1i32).to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("negative"), "got {err}");
    }

    #[test]
    fn deep_superclass_chain_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&STREAM_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&STREAM_VERSION.to_be_bytes());
        bytes.push(TC_OBJECT);
        for _ in 0..10_000 {
            // name "X", suid, serializable, no fields, no annotations
            bytes.extend_from_slice(&[TC_CLASSDESC, 0x00, 0x01, b'X']);
            bytes.extend_from_slice(&[0u8; 8]);
            bytes.extend_from_slice(&[SC_SERIALIZABLE, 0x00, 0x00, TC_ENDBLOCKDATA]);
        }
        bytes.push(TC_NULL);

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Legacy(_)), "got {err:?}");
        assert!(err.to_string().contains("too deep"), "got {err}");
    }

    #[test]
    fn codec_falls_back_to_legacy_stream() {
        let records = sample_records();
        let bytes = JavaStream::array_list(RETIRED_RECORD_CLASS, &records);
        let (decoded, format) = codec::decode_tagged(&bytes).unwrap();
        assert_eq!(decoded, records);
        assert_eq!(format, MetadataFormat::Legacy);
    }
}
