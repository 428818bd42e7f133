//! Reduction of polygons to straight wire segments.

use std::cmp::Ordering;

use geometry::prelude::*;

use crate::shapes::segment_region;

/// Lines adding less new area than this fraction of their width squared are redundant.
const REDUNDANT_FRACTION: f64 = 0.5;

/// Residual passes after the first.
const MAX_PASSES: usize = 4;

const EPS: f64 = 1e-6;

/// A candidate straight wire through a polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Centerline {
    pub head: FPoint,
    pub tail: FPoint,
    pub width: f64,
    /// Direction from head to tail in tenths of a degree, in `[0, 1800)`.
    pub angle: i32,
    /// The head meets another centerline.
    pub head_hub: bool,
    pub tail_hub: bool,
    /// The head extends past its endpoint by half the width.
    pub head_ext: bool,
    pub tail_ext: bool,
    /// Number of ends beyond which the original geometry continues.
    pub extensions: u8,
}

impl Centerline {
    fn new(head: FPoint, tail: FPoint, width: f64, angle: i32) -> Self {
        Self {
            head,
            tail,
            width,
            angle,
            head_hub: false,
            tail_hub: false,
            head_ext: false,
            tail_ext: false,
            extensions: 0,
        }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.head.distance(self.tail)
    }

    /// Unit vector from head to tail.
    pub fn dir(&self) -> FPoint {
        let len = self.length();
        if len <= EPS {
            FPoint::unit(self.angle)
        } else {
            (self.tail - self.head).scale(1. / len)
        }
    }

    /// The area swept by the line, including extended ends.
    pub fn footprint(&self) -> Region {
        let half = self.width / 2.;
        segment_region(
            self.head,
            self.tail,
            self.width,
            if self.head_ext { half } else { 0. },
            if self.tail_ext { half } else { 0. },
        )
    }

    fn bare_footprint(&self) -> Region {
        segment_region(self.head, self.tail, self.width, 0., 0.)
    }

    fn area(&self) -> f64 {
        self.length() * self.width
    }

    /// Parameter of `p` projected onto the line, measured from the head.
    fn param(&self, p: FPoint) -> f64 {
        (p - self.head).dot(self.dir())
    }
}

fn edge_angle(a: FPoint, b: FPoint) -> i32 {
    let d = b - a;
    let deg10 = (d.y.atan2(d.x).to_degrees() * 10.).round() as i32;
    deg10.rem_euclid(1800)
}

/// Unit vector for a direction in `[0, 1800)`, following the edge when it is not Manhattan.
fn edge_dir(a: FPoint, b: FPoint, angle: i32) -> FPoint {
    if angle % 900 == 0 {
        return FPoint::unit(angle);
    }
    let d = b - a;
    let u = d.scale(1. / d.norm());
    if u.y < 0. || (u.y == 0. && u.x < 0.) {
        u.scale(-1.)
    } else {
        u
    }
}

/// The largest distance beyond `from` (in unit steps along `grow`) that keeps the line inside `region`.
fn grow_end(
    region: &Region,
    fixed: FPoint,
    from: FPoint,
    dir: FPoint,
    width: f64,
    limit: f64,
) -> f64 {
    let fits = |d: f64| region.contains_region(&segment_region(fixed, from + dir.scale(d), width, 0., 0.));
    let mut good = 0.;
    let mut step = 1.;
    while step <= limit && fits(good + step) {
        good += step;
        step *= 2.;
    }
    let mut bad = good + step;
    while bad - good > 1. {
        let mid = ((good + bad) / 2.).floor();
        if mid <= good {
            break;
        }
        if fits(mid) {
            good = mid;
        } else {
            bad = mid;
        }
    }
    good
}

/// Every maximal line found by pairing parallel edges of `region`.
fn candidates(region: &Region, original: &Region) -> Vec<Centerline> {
    let edges: Vec<(FPoint, FPoint, i32)> = region
        .edges()
        .into_iter()
        .map(|(a, b)| (a, b, edge_angle(a, b)))
        .collect();
    let limit = region
        .bbox()
        .map(|b| (b.width() + b.height()) as f64)
        .unwrap_or(0.);

    let mut out: Vec<Centerline> = Vec::new();
    for (i, &(a1, b1, angle)) in edges.iter().enumerate() {
        for &(a2, b2, angle2) in &edges[i + 1..] {
            if angle != angle2 {
                continue;
            }
            let u = edge_dir(a1, b1, angle);
            let n = u.perp();
            let (d1, d2) = (n.dot(a1), n.dot(a2));
            let width = (d2 - d1).abs();
            if width <= EPS {
                continue;
            }
            let mid = (d1 + d2) / 2.;
            let span = |a: FPoint, b: FPoint| {
                let (s, t) = (u.dot(a), u.dot(b));
                (s.min(t), s.max(t))
            };
            let (lo1, hi1) = span(a1, b1);
            let (lo2, hi2) = span(a2, b2);
            let (lo, hi) = (lo1.max(lo2), hi1.min(hi2));
            if hi - lo <= EPS {
                continue;
            }
            let at = |t: f64| u.scale(t) + n.scale(mid);
            let (head, tail) = (at(lo), at(hi));
            if !region.contains_region(&segment_region(head, tail, width, 0., 0.)) {
                continue;
            }
            let tail_more = grow_end(region, head, tail, u, width, limit);
            let tail = tail + u.scale(tail_more);
            let head_more = grow_end(region, tail, head, u.scale(-1.), width, limit);
            let head = head - u.scale(head_more);
            let mut line = Centerline::new(head, tail, width, angle);
            if line.length() + EPS < width {
                continue;
            }
            line.extensions = count_extensions(&line, original);
            out.push(line);
        }
    }

    out.sort_by(rank);
    out.dedup_by(|a, b| same_line(a, b));
    out
}

fn same_line(a: &Centerline, b: &Centerline) -> bool {
    a.head.distance(b.head) < 1e-3 && a.tail.distance(b.tail) < 1e-3 && (a.width - b.width).abs() < 1e-3
}

/// Counts the ends past which `original` continues.
fn count_extensions(line: &Centerline, original: &Region) -> u8 {
    let u = line.dir();
    let probe = |p: FPoint, d: FPoint| {
        let strip = segment_region(p, p + d, line.width / 2., 0., 0.);
        original.overlaps(&strip)
    };
    probe(line.head, u.scale(-1.)) as u8 + probe(line.tail, u) as u8
}

/// Orders candidates best first.
fn rank(a: &Centerline, b: &Centerline) -> Ordering {
    b.extensions
        .cmp(&a.extensions)
        .then(b.length().total_cmp(&a.length()))
        .then(b.area().total_cmp(&a.area()))
        .then(a.angle.cmp(&b.angle))
        .then(a.head.x.total_cmp(&b.head.x))
        .then(a.head.y.total_cmp(&b.head.y))
        .then(a.width.total_cmp(&b.width))
}

/// Greedily keeps the candidates that each cover enough new area.
fn select(candidates: Vec<Centerline>) -> Vec<Centerline> {
    let mut covered = Region::new();
    let mut picked = Vec::new();
    for line in candidates {
        let footprint = line.bare_footprint();
        let fresh = footprint.difference(&covered).area();
        if fresh > REDUNDANT_FRACTION * line.width * line.width {
            covered.add(&footprint);
            picked.push(line);
        }
    }
    picked
}

/// Reduces `region` to centerlines, joining those that meet.
///
/// `original` is the full geometry of the layer, used to decide which ends
/// continue into geometry explained elsewhere and whether joined ends may extend.
pub fn skeletonize(region: &Region, original: &Region, grid: i64) -> Vec<Centerline> {
    let mut lines = Vec::new();
    let mut remaining = region.clone();
    for pass in 0..=MAX_PASSES {
        if remaining.is_empty() {
            break;
        }
        let picked = select(candidates(&remaining, original));
        if picked.is_empty() {
            break;
        }
        tracing::trace!(pass, lines = picked.len(), "found centerlines");
        for line in &picked {
            remaining.subtract(&line.bare_footprint());
        }
        lines.extend(picked);
    }
    join(&mut lines, original, grid);
    lines
}

/// Which end of a line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum End {
    Head,
    Tail,
}

fn end_point(line: &Centerline, end: End) -> FPoint {
    match end {
        End::Head => line.head,
        End::Tail => line.tail,
    }
}

/// The end of `line` within `reach` of `p`.
fn end_near(line: &Centerline, p: FPoint, reach: f64) -> Option<End> {
    let dh = line.head.distance(p);
    let dt = line.tail.distance(p);
    let (end, d) = if dh <= dt { (End::Head, dh) } else { (End::Tail, dt) };
    (d <= reach + EPS).then_some(end)
}

/// Returns `true` if `p` lies strictly between the ends of `line`.
fn interior(line: &Centerline, p: FPoint) -> bool {
    let t = line.param(p);
    t > EPS && t < line.length() - EPS
}

fn intersection(a: &Centerline, b: &Centerline) -> Option<FPoint> {
    let (ua, ub) = (a.dir(), b.dir());
    let denom = ua.cross(ub);
    if denom.abs() <= 1e-9 {
        return None;
    }
    let t = (b.head - a.head).cross(ub) / denom;
    Some(a.head + ua.scale(t))
}

/// The point of `line`'s infinite extension nearest to `p`.
fn project(line: &Centerline, p: FPoint) -> FPoint {
    line.head + line.dir().scale(line.param(p))
}

/// Moves an end of `line` to `p`, extending it there if the extension fits.
fn attach(line: &mut Centerline, end: End, p: FPoint, original: &Region) -> bool {
    let moved = end_point(line, end).distance(p) > EPS;
    match end {
        End::Head => {
            line.head = p;
            line.head_hub = true;
            line.head_ext = true;
        }
        End::Tail => {
            line.tail = p;
            line.tail_hub = true;
            line.tail_ext = true;
        }
    }
    if !original.contains_region(&line.footprint()) {
        match end {
            End::Head => line.head_ext = false,
            End::Tail => line.tail_ext = false,
        }
    }
    moved
}

/// Splits `line` at `p`, returning the piece beyond `p`.
fn split(line: &mut Centerline, p: FPoint) -> Centerline {
    let mut rest = line.clone();
    rest.head = p;
    rest.head_hub = true;
    rest.head_ext = false;
    line.tail = p;
    line.tail_hub = true;
    line.tail_ext = false;
    rest
}

/// Joins lines that cross or meet at their true intersections.
fn join(lines: &mut Vec<Centerline>, original: &Region, grid: i64) {
    let mut budget = 4 * lines.len() * lines.len() + 16;
    let mut changed = true;
    while changed && budget > 0 {
        changed = false;
        'pairs: for i in 0..lines.len() {
            for j in i + 1..lines.len() {
                budget = budget.saturating_sub(1);
                if budget == 0 {
                    break 'pairs;
                }
                let Some(p) = intersection(&lines[i], &lines[j]) else {
                    continue;
                };
                let (a, b) = (&lines[i], &lines[j]);
                let a_end = end_near(a, p, b.width / 2.);
                let b_end = end_near(b, p, a.width / 2.);
                let (a_in, b_in) = (interior(a, p), interior(b, p));

                // Off-grid meeting points get a short connecting stub.
                let snapped = p.snap_to_grid(grid).to_f();
                let (pa, pb) = if p.is_on_grid(grid) {
                    (p, p)
                } else {
                    (project(a, snapped), project(b, snapped))
                };

                let mut stub = None;
                match (a_end, b_end) {
                    (Some(ea), Some(eb)) => {
                        let ma = attach(&mut lines[i], ea, pa, original);
                        let mb = attach(&mut lines[j], eb, pb, original);
                        changed |= ma || mb;
                        if ma || mb {
                            stub = Some((pa, pb));
                        }
                    }
                    (Some(ea), None) if b_in => {
                        attach(&mut lines[i], ea, pa, original);
                        let rest = split(&mut lines[j], pb);
                        lines.push(rest);
                        stub = Some((pa, pb));
                        changed = true;
                    }
                    (None, Some(eb)) if a_in => {
                        attach(&mut lines[j], eb, pb, original);
                        let rest = split(&mut lines[i], pa);
                        lines.push(rest);
                        stub = Some((pa, pb));
                        changed = true;
                    }
                    (None, None) if a_in && b_in => {
                        let rest_a = split(&mut lines[i], pa);
                        let rest_b = split(&mut lines[j], pb);
                        lines.push(rest_a);
                        lines.push(rest_b);
                        stub = Some((pa, pb));
                        changed = true;
                    }
                    _ => {}
                }
                if let Some((pa, pb)) = stub {
                    if pa.snap_to_grid(grid) != pb.snap_to_grid(grid) {
                        let width = lines[i].width.min(lines[j].width);
                        let mut line = Centerline::new(pa, pb, width, edge_angle(pa, pb));
                        line.head_hub = true;
                        line.tail_hub = true;
                        lines.push(line);
                    }
                }
                if changed {
                    break 'pairs;
                }
            }
        }
    }
    lines.retain(|l| l.length() > EPS && l.width > EPS);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(points: &[(i64, i64)]) -> Region {
        Region::from_polygon(&Polygon::new(
            points.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
        ))
    }

    #[test]
    fn rectangle_gives_one_line() {
        let r = region(&[(0, 0), (40, 0), (40, 6), (0, 6)]);
        let lines = skeletonize(&r, &r, 1);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        approx::assert_abs_diff_eq!(line.width, 6.);
        assert_eq!(line.angle, 0);
        approx::assert_abs_diff_eq!(line.length(), 40.);
        assert!(!line.head_ext && !line.tail_ext);
    }

    #[test]
    fn l_shape_meets_at_corner() {
        let r = region(&[(0, 0), (40, 0), (40, 40), (34, 40), (34, 6), (0, 6)]);
        let lines = skeletonize(&r, &r, 1);
        assert_eq!(lines.len(), 2);
        let corner = FPoint::new(37., 3.);
        for line in &lines {
            let at_corner = line.head.distance(corner) < 1e-6 || line.tail.distance(corner) < 1e-6;
            assert!(at_corner, "{line:?} does not reach the corner");
        }
        let mut covered = Region::new();
        for line in &lines {
            covered.add(&line.footprint());
        }
        approx::assert_abs_diff_eq!(covered.area(), r.area(), epsilon = 1e-6);
    }

    #[test]
    fn tee_splits_the_bar() {
        let r = region(&[
            (0, 0),
            (40, 0),
            (40, 6),
            (23, 6),
            (23, 30),
            (17, 30),
            (17, 6),
            (0, 6),
        ]);
        let lines = skeletonize(&r, &r, 1);
        assert_eq!(lines.len(), 3);
        let hub = FPoint::new(20., 3.);
        let meeting = lines
            .iter()
            .filter(|l| l.head.distance(hub) < 1e-6 || l.tail.distance(hub) < 1e-6)
            .count();
        assert_eq!(meeting, 3);
    }

    #[test]
    fn square_is_not_split() {
        let r = region(&[(0, 0), (6, 0), (6, 6), (0, 6)]);
        let lines = skeletonize(&r, &r, 1);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].angle, 0);
    }
}
