//! Typed (de)serialization over a [`ChunkBuffer`]: arithmetic, strings,
//! vectors (arithmetic fast path), tuples, and [`Any`].
//!
//! A bulk `memcpy`-style fast path is used for arithmetic vector element
//! types, falling back to an element-by-element encoding otherwise. Rust's
//! coherence rules don't allow a blanket `impl<T> Serialize for Vec<T>`
//! alongside concrete overrides for specific `T` (that's two impls for the
//! same type, E0119), so instead of a blanket we only implement `Serialize`/
//! `Deserialize` for the concrete `Vec<T>` instantiations this crate
//! actually moves: arithmetic element types get the bulk-copy fast path via
//! one macro, `Vec<Any>` and `Vec<String>` get an explicit element-wise
//! impl. There is no generic `Vec<T>` impl to fall back on — a caller
//! reaching for an unsupported element type is a compile error, which is the
//! right outcome for a closed wire format.

use crate::any::Any;
use crate::buffer::{ChunkBuffer, Pod};
use crate::error::RpcError;

pub trait Serialize {
    fn serialize(&self, buf: &mut ChunkBuffer);
}

pub trait Deserialize: Sized {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError>;
}

macro_rules! impl_arith_scalar {
    ($($t:ty),+) => {
        $(
            impl Serialize for $t {
                fn serialize(&self, buf: &mut ChunkBuffer) {
                    buf.write_pod(*self);
                }
            }
            impl Deserialize for $t {
                fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
                    Ok(buf.read_pod::<$t>()?)
                }
            }
        )+
    };
}

impl_arith_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Serialize for bool {
    fn serialize(&self, buf: &mut ChunkBuffer) {
        buf.write(&[*self as u8]);
    }
}
impl Deserialize for bool {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        let mut b = [0u8; 1];
        buf.read(&mut b)?;
        Ok(b[0] != 0)
    }
}

impl Serialize for String {
    fn serialize(&self, buf: &mut ChunkBuffer) {
        buf.write_pod(self.len() as u32);
        buf.write(self.as_bytes());
    }
}
impl Deserialize for String {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        let len = buf.read_pod::<u32>()? as usize;
        let mut bytes = vec![0u8; len];
        buf.read(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| RpcError::InvalidParameters)
    }
}

impl Serialize for Any {
    fn serialize(&self, buf: &mut ChunkBuffer) {
        self.write_to(buf);
    }
}
impl Deserialize for Any {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        Any::read_from(buf)
    }
}

/// Bulk-copy fast path for vectors of arithmetic element types: a single
/// `i32` length followed by `length * size_of::<T>()` contiguous bytes.
macro_rules! impl_vec_arith_fast_path {
    ($($t:ty),+) => {
        $(
            impl Serialize for Vec<$t> {
                fn serialize(&self, buf: &mut ChunkBuffer) {
                    buf.write_pod(self.len() as i32);
                    for v in self {
                        buf.write_pod(*v);
                    }
                }
            }
            impl Deserialize for Vec<$t> {
                fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
                    let len = buf.read_pod::<i32>()?;
                    if len < 0 {
                        return Err(RpcError::InvalidParameters);
                    }
                    let len = len as usize;
                    let mut out = Vec::with_capacity(len);
                    for _ in 0..len {
                        out.push(buf.read_pod::<$t>()?);
                    }
                    Ok(out)
                }
            }
        )+
    };
}

impl_vec_arith_fast_path!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Serialize for Vec<Any> {
    fn serialize(&self, buf: &mut ChunkBuffer) {
        buf.write_pod(self.len() as i32);
        for v in self {
            v.write_to(buf);
        }
    }
}
impl Deserialize for Vec<Any> {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        let len = buf.read_pod::<i32>()?;
        if len < 0 {
            return Err(RpcError::InvalidParameters);
        }
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(Any::read_from(buf)?);
        }
        Ok(out)
    }
}

impl Serialize for Vec<String> {
    fn serialize(&self, buf: &mut ChunkBuffer) {
        buf.write_pod(self.len() as i32);
        for v in self {
            v.serialize(buf);
        }
    }
}
impl Deserialize for Vec<String> {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        let len = buf.read_pod::<i32>()?;
        if len < 0 {
            return Err(RpcError::InvalidParameters);
        }
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(String::deserialize(buf)?);
        }
        Ok(out)
    }
}

impl<A: Serialize, B: Serialize> Serialize for (A, B) {
    fn serialize(&self, buf: &mut ChunkBuffer) {
        self.0.serialize(buf);
        self.1.serialize(buf);
    }
}
impl<A: Deserialize, B: Deserialize> Deserialize for (A, B) {
    fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        Ok((A::deserialize(buf)?, B::deserialize(buf)?))
    }
}

macro_rules! impl_tuple_serde {
    ($($idx:tt : $t:ident),+) => {
        impl<$($t: Serialize),+> Serialize for ($($t,)+) {
            fn serialize(&self, buf: &mut ChunkBuffer) {
                $(self.$idx.serialize(buf);)+
            }
        }
        impl<$($t: Deserialize),+> Deserialize for ($($t,)+) {
            fn deserialize(buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
                Ok(($($t::deserialize(buf)?,)+))
            }
        }
    };
}

impl Serialize for () {
    fn serialize(&self, _buf: &mut ChunkBuffer) {}
}
impl Deserialize for () {
    fn deserialize(_buf: &mut ChunkBuffer) -> Result<Self, RpcError> {
        Ok(())
    }
}

impl_tuple_serde!(0: A);
impl_tuple_serde!(0: A, 1: B, 2: C);
impl_tuple_serde!(0: A, 1: B, 2: C, 3: D);
impl_tuple_serde!(0: A, 1: B, 2: C, 3: D, 4: E);
impl_tuple_serde!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_arithmetic_vector_using_the_fast_path() {
        let mut buf = ChunkBuffer::new();
        let v: Vec<i32> = vec![1, 2, 3, 4];
        v.serialize(&mut buf);
        // i32 length prefix + 4 * 4 bytes payload, per the external wire format.
        assert_eq!(buf.len(), 4 + 4 * 4);
        let back = Vec::<i32>::deserialize(&mut buf).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn roundtrips_tuple_in_declaration_order() {
        let mut buf = ChunkBuffer::new();
        let original = (1i32, "hi".to_string(), 2.5f32);
        original.serialize(&mut buf);
        let back = <(i32, String, f32)>::deserialize(&mut buf).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn roundtrips_vec_of_any() {
        let mut buf = ChunkBuffer::new();
        let values = vec![Any::I32(1), Any::Str("x".into())];
        values.serialize(&mut buf);
        let back = Vec::<Any>::deserialize(&mut buf).unwrap();
        assert_eq!(back, values);
    }
}
