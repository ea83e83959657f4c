//! Motion clips (`NXMO` chunks) and their sub motions.
//!
//! A motion is a set of sub motions. Each sub motion animates one channel of
//! one node (a translation axis, a rotation axis, a material color
//! component, ...) through a run of keyframes stored elsewhere in the chunk
//! and addressed by offset.
//!
//! Keyframe records carry no type tag on disk. The record layout is
//! determined once per sub motion from the sub motion's flag word (and, for
//! the generic encodings, from the declared record size) before any record
//! is read, and every keyframe in that sub motion uses the layout selected
//! by [KeyframeFormat::select]. A flag word that matches no rule fails the
//! decode with [Error::UnrecognizedKeyframeFormat] rather than guessing at
//! an unknown layout.

use crate::{read_at, Error, Vector3};
use binread::{
    io::{Read, Seek},
    BinRead, BinReaderExt, BinResult, ReadOptions,
};
use modular_bitfield::prelude::*;

#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};

macro_rules! flags_raw_impl {
    ($ty:ident) => {
        impl $ty {
            /// Creates the flags from the 32 bit word as stored on disk.
            pub fn from_raw(value: u32) -> Self {
                Self::from_bytes(value.to_le_bytes())
            }

            /// The 32 bit word as stored on disk.
            pub fn into_raw(self) -> u32 {
                u32::from_le_bytes(self.into_bytes())
            }
        }

        impl BinRead for $ty {
            type Args = ();

            fn read_options<R: Read + Seek>(
                reader: &mut R,
                options: &ReadOptions,
                _args: Self::Args,
            ) -> BinResult<Self> {
                let value = u32::read_options(reader, options, ())?;
                Ok(Self::from_raw(value))
            }
        }
    };
}

/// The NND_MOTIONTYPE flag word describing what a [Motion] animates and how
/// it repeats.
#[bitfield(bits = 32)]
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionFlags {
    pub node: bool,
    pub camera: bool,
    pub light: bool,
    pub morph: bool,
    pub material: bool,
    #[skip]
    __: B11,
    pub trigger: bool,
    pub no_repeat: bool,
    pub constant_repeat: bool,
    pub repeat: bool,
    pub mirror: bool,
    pub offset: bool,
    #[skip]
    __: B10,
}

flags_raw_impl!(MotionFlags);

impl MotionFlags {
    /// The clip level repeat behavior.
    ///
    /// The repeat bits are tested in a fixed precedence order and the first
    /// set bit wins, so a word with several repeat bits set still resolves
    /// deterministically.
    pub fn repeat_mode(&self) -> Option<RepeatMode> {
        repeat_mode(
            self.no_repeat(),
            self.constant_repeat(),
            self.repeat(),
            self.mirror(),
            self.offset(),
        )
    }
}

/// The NND_SMOTTYPE flag word identifying the channel a [SubMotion] animates
/// and the numeric encoding of its keyframes.
#[bitfield(bits = 32)]
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMotionFlags {
    pub frame_float: bool,
    pub frame_sint16: bool,
    pub angle_radian: bool,
    pub angle_angle32: bool,
    pub angle_angle16: bool,
    pub translation_x: bool,
    pub translation_y: bool,
    pub translation_z: bool,
    pub rotation_x: bool,
    pub rotation_y: bool,
    pub rotation_z: bool,
    pub quaternion: bool,
    pub scaling_x: bool,
    pub scaling_y: bool,
    pub scaling_z: bool,
    pub user_uint32: bool,
    pub user_float: bool,
    pub node_hide: bool,
    pub ambient_r: bool,
    pub ambient_g: bool,
    pub ambient_b: bool,
    pub diffuse_r: bool,
    pub diffuse_g: bool,
    pub diffuse_b: bool,
    pub specular_r: bool,
    pub specular_g: bool,
    pub specular_b: bool,
    pub light_color_r: bool,
    pub light_color_g: bool,
    pub light_color_b: bool,
    #[skip]
    __: B2,
}

flags_raw_impl!(SubMotionFlags);

impl SubMotionFlags {
    /// Any translation axis bit is set.
    pub fn has_translation(&self) -> bool {
        self.translation_x() || self.translation_y() || self.translation_z()
    }

    /// Any scaling axis bit is set.
    pub fn has_scaling(&self) -> bool {
        self.scaling_x() || self.scaling_y() || self.scaling_z()
    }

    /// Any ambient color component bit is set.
    pub fn has_ambient(&self) -> bool {
        self.ambient_r() || self.ambient_g() || self.ambient_b()
    }

    /// Any diffuse color component bit is set.
    pub fn has_diffuse(&self) -> bool {
        self.diffuse_r() || self.diffuse_g() || self.diffuse_b()
    }

    /// Any specular color component bit is set.
    pub fn has_specular(&self) -> bool {
        self.specular_r() || self.specular_g() || self.specular_b()
    }

    /// Any light color component bit is set.
    pub fn has_light_color(&self) -> bool {
        self.light_color_r() || self.light_color_g() || self.light_color_b()
    }

    /// All three rotation axis bits are set.
    ///
    /// Single axis rotations deliberately do not count. They use the
    /// generic integer or float keyframe encodings instead of the packed
    /// three axis record.
    pub fn has_rotation_xyz(&self) -> bool {
        self.rotation_x() && self.rotation_y() && self.rotation_z()
    }
}

/// The NND_SMOTIPTYPE flag word: how keyframes are interpolated and how the
/// channel repeats outside its frame range.
#[bitfield(bits = 32)]
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolationFlags {
    pub spline: bool,
    pub linear: bool,
    pub constant: bool,
    pub bezier: bool,
    pub si_spline: bool,
    pub trigger: bool,
    pub quat_lerp: bool,
    pub quat_slerp: bool,
    pub quat_squad: bool,
    #[skip]
    __: B7,
    pub no_repeat: bool,
    pub constant_repeat: bool,
    pub repeat: bool,
    pub mirror: bool,
    pub offset: bool,
    #[skip]
    __: B11,
}

flags_raw_impl!(InterpolationFlags);

impl InterpolationFlags {
    /// The channel's repeat behavior, first set bit wins.
    pub fn repeat_mode(&self) -> Option<RepeatMode> {
        repeat_mode(
            self.no_repeat(),
            self.constant_repeat(),
            self.repeat(),
            self.mirror(),
            self.offset(),
        )
    }

    /// The tangent mode between keyframes, first set bit wins.
    pub fn interpolation_mode(&self) -> Option<InterpolationMode> {
        if self.spline() {
            Some(InterpolationMode::Spline)
        } else if self.linear() {
            Some(InterpolationMode::Linear)
        } else if self.constant() {
            Some(InterpolationMode::Constant)
        } else if self.bezier() {
            Some(InterpolationMode::Bezier)
        } else if self.si_spline() {
            Some(InterpolationMode::SiSpline)
        } else {
            None
        }
    }
}

/// Behavior outside the animated frame range.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    NoRepeat,
    ConstantRepeat,
    Repeat,
    Mirror,
    Offset,
}

/// Tangent mode between keyframes.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Spline,
    Linear,
    Constant,
    Bezier,
    SiSpline,
}

fn repeat_mode(
    no_repeat: bool,
    constant_repeat: bool,
    repeat: bool,
    mirror: bool,
    offset: bool,
) -> Option<RepeatMode> {
    if no_repeat {
        Some(RepeatMode::NoRepeat)
    } else if constant_repeat {
        Some(RepeatMode::ConstantRepeat)
    } else if repeat {
        Some(RepeatMode::Repeat)
    } else if mirror {
        Some(RepeatMode::Mirror)
    } else if offset {
        Some(RepeatMode::Offset)
    } else {
        None
    }
}

/// Frame and three component value, used for translation, scaling, and
/// color channels.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    pub frame: f32,
    pub value: Vector3,
}

/// Frame and a packed three axis rotation in binary angle units.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq)]
pub struct RotateA16Key {
    pub frame: f32,
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Integer frame and a 32 bit signed value, a binary angle when the sub
/// motion's angle_angle32 bit is set.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sint32Key {
    pub frame: i32,
    pub value: i32,
}

/// Frame and a single float value.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq)]
pub struct FloatKey {
    pub frame: f32,
    pub value: f32,
}

/// 16 bit frame and a 16 bit signed value.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sint16Key {
    pub frame: i16,
    pub value: i16,
}

/// One keyframe record. All keyframes of a sub motion share the same
/// variant.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyframe {
    Vector(VectorKey),
    RotateA16(RotateA16Key),
    Sint32(Sint32Key),
    Float(FloatKey),
    Sint16(Sint16Key),
}

impl Keyframe {
    /// The frame the key sits on, widened to `f32` for the integer frame
    /// encodings.
    pub fn frame(&self) -> f32 {
        match self {
            Keyframe::Vector(key) => key.frame,
            Keyframe::RotateA16(key) => key.frame,
            Keyframe::Sint32(key) => key.frame as f32,
            Keyframe::Float(key) => key.frame,
            Keyframe::Sint16(key) => f32::from(key.frame),
        }
    }
}

/// The record layout shared by every keyframe of one sub motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyframeFormat {
    Vector,
    RotateA16,
    Sint32,
    Float,
    Sint16,
}

impl KeyframeFormat {
    /// Selects the record layout from the sub motion's flag word and its
    /// declared per record byte size.
    ///
    /// The rules are order sensitive and the first match wins:
    /// 1. any translation, scaling, or color channel bit selects [VectorKey]
    /// 2. all three rotation axis bits select [RotateA16Key]
    /// 3. frame_float together with angle_angle32 selects [Sint32Key]
    /// 4. frame_float with an 8 byte record selects [FloatKey]
    /// 5. frame_sint16 with a 4 byte record selects [Sint16Key]
    ///
    /// Anything else fails with [Error::UnrecognizedKeyframeFormat] carrying
    /// the offending flag word. The layout of an unrecognized encoding is
    /// unknown, so no record is ever produced for one.
    pub fn select(flags: SubMotionFlags, keyframe_size: u32) -> Result<Self, Error> {
        if flags.has_translation()
            || flags.has_scaling()
            || flags.has_ambient()
            || flags.has_diffuse()
            || flags.has_specular()
            || flags.has_light_color()
        {
            Ok(KeyframeFormat::Vector)
        } else if flags.has_rotation_xyz() {
            Ok(KeyframeFormat::RotateA16)
        } else if flags.frame_float() && flags.angle_angle32() {
            Ok(KeyframeFormat::Sint32)
        } else if flags.frame_float() && keyframe_size == 8 {
            Ok(KeyframeFormat::Float)
        } else if flags.frame_sint16() && keyframe_size == 4 {
            Ok(KeyframeFormat::Sint16)
        } else {
            Err(Error::UnrecognizedKeyframeFormat {
                flags: flags.into_raw(),
                keyframe_size,
            })
        }
    }

    /// Reads a single keyframe record at the current position.
    pub fn read_keyframe<R: Read + Seek>(&self, reader: &mut R) -> Result<Keyframe, Error> {
        Ok(match self {
            KeyframeFormat::Vector => Keyframe::Vector(reader.read_le()?),
            KeyframeFormat::RotateA16 => Keyframe::RotateA16(reader.read_le()?),
            KeyframeFormat::Sint32 => Keyframe::Sint32(reader.read_le()?),
            KeyframeFormat::Float => Keyframe::Float(reader.read_le()?),
            KeyframeFormat::Sint16 => Keyframe::Sint16(reader.read_le()?),
        })
    }
}

/// Converts a binary angle to degrees. A full turn is 65536 units.
pub fn binary_angle_to_degrees(angle: i32) -> f32 {
    (f64::from(angle) * (180.0 / 32768.0)) as f32
}

#[derive(BinRead, Debug)]
struct SubMotionHeader {
    flags: SubMotionFlags,
    interpolation: InterpolationFlags,
    node_index: i32,
    start_frame: f32,
    end_frame: f32,
    start_keyframe: f32,
    end_keyframe: f32,
    keyframe_count: u32,
    keyframe_size: u32,
    keyframe_offset: u32,
}

/// One animation channel of one node.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SubMotion {
    pub flags: SubMotionFlags,
    pub interpolation: InterpolationFlags,
    /// The index of the animated node. For camera, light, and material
    /// motions this indexes the corresponding list instead of the node
    /// array. Not validated here.
    pub node_index: i32,
    pub start_frame: f32,
    pub end_frame: f32,
    pub start_keyframe: f32,
    pub end_keyframe: f32,
    pub keyframes: Vec<Keyframe>,
}

impl SubMotion {
    /// Reads a sub motion from a stream positioned at its header.
    ///
    /// The keyframe run is read through its offset and the stream is
    /// restored to the position just after the 40 byte header before
    /// returning, on the error path as well.
    pub fn read<R: Read + Seek>(reader: &mut R, base: u64) -> Result<Self, Error> {
        let header: SubMotionHeader = reader.read_le()?;

        let keyframes = if header.keyframe_count == 0 {
            Vec::new()
        } else {
            // The layout is resolved once and reused for every record.
            let format = KeyframeFormat::select(header.flags, header.keyframe_size)?;
            read_at(reader, base, header.keyframe_offset, |reader| {
                (0..header.keyframe_count)
                    .map(|_| format.read_keyframe(reader))
                    .collect()
            })?
        };

        Ok(SubMotion {
            flags: header.flags,
            interpolation: header.interpolation,
            node_index: header.node_index,
            start_frame: header.start_frame,
            end_frame: header.end_frame,
            start_keyframe: header.start_keyframe,
            end_keyframe: header.end_keyframe,
            keyframes,
        })
    }
}

#[derive(BinRead, Debug)]
struct MotionHeader {
    flags: MotionFlags,
    start_frame: f32,
    end_frame: f32,
    sub_motion_count: u32,
    sub_motion_offset: u32,
    framerate: f32,
    reserved0: u32,
    reserved1: u32,
}

/// A decoded motion clip.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    pub flags: MotionFlags,
    pub start_frame: f32,
    pub end_frame: f32,
    pub sub_motions: Vec<SubMotion>,
    pub framerate: f32,
    pub reserved0: u32,
    pub reserved1: u32,
}

impl Motion {
    /// Reads the motion chunk from a stream positioned at its offset cell,
    /// just after the chunk tag and size. Offsets inside the chunk are
    /// relative to `base`.
    pub fn read<R: Read + Seek>(reader: &mut R, base: u64) -> Result<Self, Error> {
        let data_offset = reader.read_le::<u32>()?;
        read_at(reader, base, data_offset, |reader| {
            let header: MotionHeader = reader.read_le()?;
            let sub_motions = read_at(reader, base, header.sub_motion_offset, |reader| {
                (0..header.sub_motion_count)
                    .map(|_| SubMotion::read(reader, base))
                    .collect()
            })?;

            Ok(Motion {
                flags: header.flags,
                start_frame: header.start_frame,
                end_frame: header.end_frame,
                sub_motions,
                framerate: header.framerate,
                reserved0: header.reserved0,
                reserved1: header.reserved1,
            })
        })
    }
}
