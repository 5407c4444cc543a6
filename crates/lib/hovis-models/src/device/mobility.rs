use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

use serde::Deserialize;
use typed_builder::TypedBuilder;

use hovis_core::bucket::TimeMS;

use crate::dist::{RngSampler, UnitSampler};

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, TypedBuilder)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Azimuth of `other` as seen from this point, in degrees counter-clockwise from the x axis.
    pub fn azimuth_to(&self, other: &Point2D) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    pub fn advanced(&self, velocity: &Velocity, seconds: f64) -> Point2D {
        Point2D::new(self.x + velocity.vx * seconds, self.y + velocity.vy * seconds)
    }
}

impl Display for Point2D {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Velocity in metres per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub fn from_heading(direction_rad: f64, speed: f64) -> Self {
        Self {
            vx: direction_rad.cos() * speed,
            vy: direction_rad.sin() * speed,
        }
    }

    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Right,
    Left,
    Top,
    Bottom,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rectangle {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn contains(&self, point: &Point2D) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
    }

    pub fn closest_side(&self, point: &Point2D) -> Side {
        let candidates = [
            (self.x_max - point.x, Side::Right),
            (point.x - self.x_min, Side::Left),
            (self.y_max - point.y, Side::Top),
            (point.y - self.y_min, Side::Bottom),
        ];
        candidates
            .iter()
            .map(|(distance, side)| (distance.abs(), *side))
            .fold((f64::INFINITY, Side::Right), |best, current| {
                if current.0 < best.0 {
                    current
                } else {
                    best
                }
            })
            .1
    }

    /// Seconds until a point moving with `velocity` leaves the rectangle for good. A point
    /// outside the rectangle whose path crosses it is carried through to the far boundary.
    /// `None` when the path never reaches the rectangle or the point does not move.
    pub fn exit_time(&self, from: &Point2D, velocity: &Velocity) -> Option<f64> {
        let (x_enter, x_exit) = Self::slab(from.x, velocity.vx, self.x_min, self.x_max)?;
        let (y_enter, y_exit) = Self::slab(from.y, velocity.vy, self.y_min, self.y_max)?;
        let enter = x_enter.max(y_enter);
        let exit = x_exit.min(y_exit);
        if enter <= exit && exit > 0.0 && exit.is_finite() {
            Some(exit)
        } else {
            None
        }
    }

    fn slab(position: f64, speed: f64, min: f64, max: f64) -> Option<(f64, f64)> {
        if speed == 0.0 {
            return if position >= min && position <= max {
                Some((f64::NEG_INFINITY, f64::INFINITY))
            } else {
                None
            };
        }
        let t_min = (min - position) / speed;
        let t_max = (max - position) / speed;
        Some((t_min.min(t_max), t_min.max(t_max)))
    }
}

pub trait MobilityModel {
    fn position_at(&mut self, now: TimeMS) -> Point2D;
}

#[derive(Clone, Debug)]
pub enum Mobility {
    Constant(ConstantPosition),
    RandomDirection(RandomDirection2d),
}

impl MobilityModel for Mobility {
    fn position_at(&mut self, now: TimeMS) -> Point2D {
        match self {
            Mobility::Constant(model) => model.position_at(now),
            Mobility::RandomDirection(model) => model.position_at(now),
        }
    }
}

#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct ConstantPosition {
    pub position: Point2D,
}

impl MobilityModel for ConstantPosition {
    fn position_at(&mut self, _now: TimeMS) -> Point2D {
        self.position
    }
}

#[derive(Clone, Copy, Debug)]
enum Leg {
    Moving {
        from: Point2D,
        velocity: Velocity,
        start: f64,
        end: f64,
    },
    Paused {
        at: Point2D,
        until: f64,
    },
}

/// Moves in a straight line at a sampled speed until it reaches the bounds, pauses there, then
/// picks a new direction pointing back into the bounds.
///
/// Positions are computed lazily for the requested time, so queries must not go back in time.
#[derive(Clone, Debug)]
pub struct RandomDirection2d {
    bounds: Rectangle,
    speed: RngSampler,
    pause: RngSampler,
    direction: UnitSampler,
    leg: Leg,
}

impl RandomDirection2d {
    pub fn new(
        start: Point2D,
        bounds: Rectangle,
        speed: RngSampler,
        pause: RngSampler,
        direction: UnitSampler,
    ) -> Self {
        let mut model = Self {
            bounds,
            speed,
            pause,
            direction,
            leg: Leg::Paused {
                at: start,
                until: 0.0,
            },
        };
        let heading = model.direction.next_in(0.0, 2.0 * PI);
        model.leg = model.start_leg(start, 0.0, heading);
        model
    }

    pub fn bounds(&self) -> &Rectangle {
        &self.bounds
    }

    fn start_leg(&mut self, from: Point2D, start: f64, heading: f64) -> Leg {
        let velocity = Velocity::from_heading(heading, self.speed.sample());
        let end = match self.bounds.exit_time(&from, &velocity) {
            Some(duration) => start + duration,
            None => f64::INFINITY,
        };
        Leg::Moving {
            from,
            velocity,
            start,
            end,
        }
    }

    fn heading_away_from(&mut self, point: &Point2D) -> f64 {
        let heading = self.direction.next_in(0.0, PI);
        match self.bounds.closest_side(point) {
            Side::Right => heading + PI / 2.0,
            Side::Left => heading - PI / 2.0,
            Side::Top => heading + PI,
            Side::Bottom => heading,
        }
    }
}

impl MobilityModel for RandomDirection2d {
    fn position_at(&mut self, now: TimeMS) -> Point2D {
        let t = now.as_secs_f64();
        loop {
            match self.leg {
                Leg::Moving {
                    from,
                    velocity,
                    start,
                    end,
                } => {
                    if t < end {
                        return from.advanced(&velocity, t - start);
                    }
                    let at = from.advanced(&velocity, end - start);
                    let until = end + self.pause.sample().max(0.0);
                    self.leg = Leg::Paused { at, until };
                }
                Leg::Paused { at, until } => {
                    if t < until {
                        return at;
                    }
                    let heading = self.heading_away_from(&at);
                    self.leg = self.start_leg(at, until, heading);
                }
            }
        }
    }
}
