use std::fmt;

/// Broad sample class deciding which interpolation policy is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Integer,
    Floating,
}

/// Declared pixel type of a volume as reported by the loader.
///
/// The display names follow the "N-bit (un)signed integer" / "N-bit float"
/// wording used by ITK-style toolkits, so a pixel-type string coming from
/// another tool can be parsed back with [`PixelKind::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PixelKind {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    #[default]
    Float32,
    Float64,
    /// Anything that is neither a scalar integer nor a scalar float
    /// (vector, complex, RGB, ...), kept verbatim.
    Other(String),
}

impl PixelKind {
    /// Integer or floating class, `None` when the kind cannot be classified.
    pub fn class(&self) -> Option<PixelClass> {
        match self {
            PixelKind::UInt8
            | PixelKind::Int8
            | PixelKind::UInt16
            | PixelKind::Int16
            | PixelKind::UInt32
            | PixelKind::Int32
            | PixelKind::UInt64
            | PixelKind::Int64 => Some(PixelClass::Integer),
            PixelKind::Float32 | PixelKind::Float64 => Some(PixelClass::Floating),
            PixelKind::Other(name) => Self::classify_name(name),
        }
    }

    /// Parse a pixel-type string such as `"16-bit signed integer"`.
    ///
    /// Exact matches map onto the scalar variants; everything else is kept as
    /// [`PixelKind::Other`] and classified by keyword later.
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "8-bit unsigned integer" => PixelKind::UInt8,
            "8-bit signed integer" => PixelKind::Int8,
            "16-bit unsigned integer" => PixelKind::UInt16,
            "16-bit signed integer" => PixelKind::Int16,
            "32-bit unsigned integer" => PixelKind::UInt32,
            "32-bit signed integer" => PixelKind::Int32,
            "64-bit unsigned integer" => PixelKind::UInt64,
            "64-bit signed integer" => PixelKind::Int64,
            "32-bit float" => PixelKind::Float32,
            "64-bit float" => PixelKind::Float64,
            _ => PixelKind::Other(name.trim().to_string()),
        }
    }

    /// Map a NIfTI-1 `datatype` code onto a pixel kind.
    pub fn from_nifti_datatype(code: i16) -> Self {
        match code {
            2 => PixelKind::UInt8,
            4 => PixelKind::Int16,
            8 => PixelKind::Int32,
            16 => PixelKind::Float32,
            64 => PixelKind::Float64,
            256 => PixelKind::Int8,
            512 => PixelKind::UInt16,
            768 => PixelKind::UInt32,
            1024 => PixelKind::Int64,
            1280 => PixelKind::UInt64,
            32 | 1792 | 2048 => PixelKind::Other("complex".to_string()),
            128 | 2304 => PixelKind::Other("vector of 8-bit unsigned integer".to_string()),
            other => PixelKind::Other(format!("nifti datatype {other}")),
        }
    }

    /// Map DICOM Bits Allocated / Pixel Representation onto an integer kind.
    pub fn from_dicom_bits(bits_allocated: u16, signed: bool) -> Self {
        match (bits_allocated, signed) {
            (8, false) => PixelKind::UInt8,
            (8, true) => PixelKind::Int8,
            (16, false) => PixelKind::UInt16,
            (16, true) => PixelKind::Int16,
            (32, false) => PixelKind::UInt32,
            (32, true) => PixelKind::Int32,
            (bits, signed) => PixelKind::Other(format!(
                "{bits}-bit {} dicom sample",
                if signed { "signed" } else { "unsigned" }
            )),
        }
    }

    // Multi-component types mention their component type ("vector of 32-bit
    // float"), so those are rejected before the keyword test.
    fn classify_name(name: &str) -> Option<PixelClass> {
        let name = name.to_ascii_lowercase();
        if ["vector", "complex", "rgb"]
            .iter()
            .any(|marker| name.contains(marker))
        {
            return None;
        }
        if name.contains("integer") {
            Some(PixelClass::Integer)
        } else if name.contains("float") {
            Some(PixelClass::Floating)
        } else {
            None
        }
    }
}

impl fmt::Display for PixelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelKind::UInt8 => "8-bit unsigned integer",
            PixelKind::Int8 => "8-bit signed integer",
            PixelKind::UInt16 => "16-bit unsigned integer",
            PixelKind::Int16 => "16-bit signed integer",
            PixelKind::UInt32 => "32-bit unsigned integer",
            PixelKind::Int32 => "32-bit signed integer",
            PixelKind::UInt64 => "64-bit unsigned integer",
            PixelKind::Int64 => "64-bit signed integer",
            PixelKind::Float32 => "32-bit float",
            PixelKind::Float64 => "64-bit float",
            PixelKind::Other(name) => name,
        };
        f.write_str(name)
    }
}
