//! Vector helpers and the transform from link/map space into continent space.
//!
//! Continent coordinates are what the gw2 world map uses: the origin is the top left corner of the continent and y grows downwards.
//! Map coordinates are inches with y growing upwards, and the mumble link reports meters with y being the *vertical* axis.
use joko_core::prelude::*;

/// inches per meter. mumble positions are in meters, the map rects of the api are in inches.
pub const INCHES_PER_METER: f64 = 39.3701;

/// projects a link position onto the map plane by dropping the vertical axis.
pub fn ground(position: DVec3) -> DVec2 {
    DVec2::new(position.x, position.z)
}

pub fn distance(a: DVec2, b: DVec2) -> f64 {
    a.distance(b)
}

/// axis aligned rectangle given by its min and max corners
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}
impl Rect {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
    fn is_degenerate(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }
}
impl From<[[f64; 2]; 2]> for Rect {
    fn from([min, max]: [[f64; 2]; 2]) -> Self {
        Self::new(min.into(), max.into())
    }
}

/// The space a position given to [to_continent_space] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSpace {
    /// meters, as reported by the mumble link
    Mumble,
    /// inches, the unit of the api's map rect
    Map,
}
impl SourceSpace {
    pub fn unit_scale(self) -> f64 {
        match self {
            SourceSpace::Mumble => INCHES_PER_METER,
            SourceSpace::Map => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum GeometryError {
    #[error("map {map_id} has a zero sized map rect or continent rect")]
    DegenerateRect { map_id: u32 },
}

pub fn to_continent_space(
    position: DVec3,
    source: SourceSpace,
    map_id: u32,
    map_rect: Rect,
    continent_rect: Rect,
) -> Result<DVec2, GeometryError> {
    if map_rect.is_degenerate() || continent_rect.is_degenerate() {
        return Err(GeometryError::DegenerateRect { map_id });
    }
    let p = ground(position) * source.unit_scale();
    let scale_x = continent_rect.width() / map_rect.width();
    let scale_y = continent_rect.height() / map_rect.height();
    // map y grows upwards, continent y grows downwards
    Ok(DVec2::new(
        continent_rect.min.x + (p.x - map_rect.min.x) * scale_x,
        continent_rect.min.y + (map_rect.max.y - p.y) * scale_y,
    ))
}
