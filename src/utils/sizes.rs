use nalgebra::{Vector2, Vector3, Vector4};
use static_assertions::const_assert_eq;

pub const F32_SIZE: u32 = size_of::<f32>() as u32;
pub const U32_SIZE: u32 = size_of::<u32>() as u32;

pub const VEC2_SIZE: u32 = size_of::<Vector2<f32>>() as u32;
pub const VEC3_SIZE: u32 = size_of::<Vector3<f32>>() as u32;
pub const VEC4_SIZE: u32 = size_of::<Vector4<f32>>() as u32;

// vertex records are tightly packed, so the nalgebra types must not carry padding
const_assert_eq!(VEC2_SIZE, 2 * F32_SIZE);
const_assert_eq!(VEC3_SIZE, 3 * F32_SIZE);
const_assert_eq!(VEC4_SIZE, 4 * F32_SIZE);

pub const POSITION_SIZE: u32 = VEC3_SIZE;
pub const NORMAL_SIZE: u32 = VEC3_SIZE;
pub const TANGENT_SIZE: u32 = VEC3_SIZE;
pub const COLOR_SIZE: u32 = VEC4_SIZE;
pub const UV_SIZE: u32 = VEC2_SIZE;

const_assert_eq!(POSITION_SIZE, 12);
const_assert_eq!(COLOR_SIZE, 16);
const_assert_eq!(UV_SIZE, 8);
