use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use rand::seq::SliceRandom;
use tracing::trace;

use crate::common::{Grid, FOUR_NEIGHBOURS, P};

use super::{Color, Field, RegionId, SitRep, State};

/// The cheap analysis steps, in the order the driver tries them.
pub(super) const ANALYSES: [fn(&mut Field, bool) -> bool; 5] = [
    Field::analyze_complete_islands,
    Field::analyze_single_liberties,
    Field::analyze_dual_liberties,
    Field::analyze_unreachable_cells,
    Field::analyze_potential_pools,
];

/// Unknown cells consumed by each region during a verboten-free
/// confinement run. Valid for one `solve` pass: any mark invalidates it.
pub(super) type CacheMap = HashMap<RegionId, BTreeSet<P>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flag {
    None,
    Open,
    Closed,
    Verboten,
}

impl Field {
    /// A full island walls itself in: all of its liberties are black.
    pub(crate) fn analyze_complete_islands(&mut self, verbose: bool) -> bool {
        let mut mark_as_black = BTreeSet::new();

        for (_, r) in self.live_regions() {
            if let Some(n) = r.number() {
                if r.size() == n {
                    mark_as_black.extend(r.unknowns().iter().copied());
                }
            }
        }

        self.process(
            verbose,
            mark_as_black,
            BTreeSet::new(),
            "Complete islands found.",
        )
    }

    /// A partial region with a single liberty has to expand into it.
    pub(crate) fn analyze_single_liberties(&mut self, verbose: bool) -> bool {
        let mut mark_as_black = BTreeSet::new();
        let mut mark_as_white = BTreeSet::new();

        for (_, r) in self.live_regions() {
            let partial = r.black() && r.size() < self.total_black()
                || r.white()
                || r.number().map_or(false, |n| r.size() < n);

            if partial && r.unknowns().len() == 1 {
                if let Some(&u) = r.unknowns().iter().next() {
                    if r.black() {
                        mark_as_black.insert(u);
                    } else {
                        mark_as_white.insert(u);
                    }
                }
            }
        }

        self.process(
            verbose,
            mark_as_black,
            mark_as_white,
            "Expanded partial regions with only one liberty.",
        )
    }

    /// An island one cell short of completion with exactly two liberties
    /// on a diagonal: whichever liberty it takes, the far corner of that
    /// 2x2 square can never join it, so the corner is black.
    pub(crate) fn analyze_dual_liberties(&mut self, verbose: bool) -> bool {
        let mut mark_as_black = BTreeSet::new();

        for (_, r) in self.live_regions() {
            if let Some(n) = r.number() {
                if r.size() == n - 1 && r.unknowns().len() == 2 {
                    let mut it = r.unknowns().iter();
                    let (u1, u2) = match (it.next(), it.next()) {
                        (Some(&u1), Some(&u2)) => (u1, u2),
                        _ => continue,
                    };

                    if (u1.x() - u2.x()).abs() == 1 && (u1.y() - u2.y()).abs() == 1 {
                        let p = if r.contains(P(u2.y(), u1.x())) {
                            P(u1.y(), u2.x())
                        } else {
                            P(u2.y(), u1.x())
                        };

                        // The far corner may already be black, or even
                        // belong to this island; then there is nothing to
                        // do. If it is white and belongs to another
                        // island, a later contradiction pass catches it.
                        if self.cell(p) == State::Unknown {
                            mark_as_black.insert(p);
                        }
                    }
                }
            }
        }

        self.process(
            verbose,
            mark_as_black,
            BTreeSet::new(),
            "N - 1 islands with exactly two diagonal liberties found.",
        )
    }

    /// Cells no hypothetical chain of white cells can connect to any
    /// island must be black. Subsumes complete-island analysis, which
    /// still runs first because it is cheap and reads better in the log.
    pub(crate) fn analyze_unreachable_cells(&mut self, verbose: bool) -> bool {
        let mut mark_as_black = BTreeSet::new();

        for y in 0..self.height() {
            for x in 0..self.width() {
                if self.unreachable(P(y, x), HashSet::new()) {
                    mark_as_black.insert(P(y, x));
                }
            }
        }

        self.process(
            verbose,
            mark_as_black,
            BTreeSet::new(),
            "Unreachable cells blackened.",
        )
    }

    /// 2x2 squares of three black cells and squares of two black cells
    /// whose remaining two cells depend on each other for reachability.
    pub(crate) fn analyze_potential_pools(&mut self, verbose: bool) -> bool {
        let mut mark_as_white = BTreeSet::new();

        for y in 0..self.height() - 1 {
            for x in 0..self.width() - 1 {
                let square = [P(y, x), P(y, x + 1), P(y + 1, x), P(y + 1, x + 1)];

                let mut unknowns = Vec::new();
                let mut blacks = 0;
                for &p in &square {
                    match self.cell(p) {
                        State::Unknown => unknowns.push(p),
                        State::Black => blacks += 1,
                        _ => {}
                    }
                }

                if blacks == 3 && unknowns.len() == 1 {
                    mark_as_white.insert(unknowns[0]);
                } else if blacks == 2 && unknowns.len() == 2 {
                    // If imagining one cell black strands the other, the
                    // first must be white.
                    for i in 0..2 {
                        let mut imagine_black = HashSet::new();
                        imagine_black.insert(unknowns[i]);

                        if self.unreachable(unknowns[1 - i], imagine_black) {
                            mark_as_white.insert(unknowns[i]);
                        }
                    }
                }
            }
        }

        self.process(
            verbose,
            BTreeSet::new(),
            mark_as_white,
            "Whitened cells to prevent pools.",
        )
    }

    /// A white region of `n` cells is impossibly big if no island could
    /// ever absorb it, counting the bridge cell the connection needs.
    pub(crate) fn impossibly_big_white_region(&self, n: i32) -> bool {
        !self
            .live_regions()
            .any(|(_, r)| r.number().map_or(false, |num| r.size() + n + 1 <= num))
    }

    /// Breadth-first search for a way to connect the unknown root to a
    /// white or numbered region by a chain of imagined white cells,
    /// refusing any step that would join two islands or overgrow one.
    /// Cells in `discovered` are treated as impassable.
    pub(crate) fn unreachable(&self, root: P, mut discovered: HashSet<P>) -> bool {
        if self.cell(root) != State::Unknown {
            return false;
        }

        let mut queue = VecDeque::new();
        queue.push_back((root, 1));
        discovered.insert(root);

        while let Some((cur, depth)) = queue.pop_front() {
            let mut white_regions = BTreeSet::new();
            let mut numbered_regions = BTreeSet::new();

            for &d in &FOUR_NEIGHBOURS {
                let q = cur + d;
                if !self.valid(q) {
                    continue;
                }
                if let Some(id) = self.region_of(q) {
                    if self.region(id).white() {
                        white_regions.insert(id);
                    } else if self.region(id).numbered() {
                        numbered_regions.insert(id);
                    }
                }
            }

            let mut adj_size = 0;
            for &id in white_regions.iter().chain(numbered_regions.iter()) {
                adj_size += self.region(id).size();
            }

            // Stepping here would join two islands.
            if numbered_regions.len() > 1 {
                continue;
            }

            if let Some(&id) = numbered_regions.iter().next() {
                if let Some(n) = self.region(id).number() {
                    if depth + adj_size <= n {
                        return false;
                    }
                }
                continue;
            }

            if !white_regions.is_empty() {
                if self.impossibly_big_white_region(depth + adj_size) {
                    continue;
                }
                return false;
            }

            for &d in &FOUR_NEIGHBOURS {
                let q = cur + d;
                if self.valid(q) && self.cell(q) == State::Unknown && discovered.insert(q) {
                    queue.push_back((q, depth + 1));
                }
            }
        }

        true
    }

    /// Simulates the freest possible expansion of region `id` with the
    /// `verboten` cells off-limits. A black region must be able to grow
    /// to the full black count, a white region must escape to an island,
    /// and an island must reach its clue. Anything less is confinement.
    pub(crate) fn confined(
        &self,
        id: RegionId,
        cache: &mut CacheMap,
        verboten: &BTreeSet<P>,
    ) -> bool {
        // A verboten cell the verboten-free run never consumed cannot
        // confine this region, so the simulation can be skipped.
        if !verboten.is_empty() {
            match cache.get(&id) {
                None => return false,
                Some(consumed) => {
                    if verboten.iter().all(|p| !consumed.contains(p)) {
                        return false;
                    }
                }
            }
        }

        let r = self.region(id);

        let mut flags = Grid::new(self.height(), self.width(), Flag::None);
        for &p in r.unknowns() {
            flags[p] = Flag::Open;
        }
        for &p in r.coords() {
            flags[p] = Flag::Closed;
        }
        let mut closed_size = r.size();

        // Verboten flags last: they override open liberties.
        for &p in verboten {
            flags[p] = Flag::Verboten;
        }

        let needs_more = |closed_size: i32| {
            r.black() && closed_size < self.total_black()
                || r.white()
                || r.number().map_or(false, |n| closed_size < n)
        };

        while needs_more(closed_size) {
            let mut open = None;
            for i in 0..(self.width() * self.height()) as usize {
                if flags[i] == Flag::Open {
                    open = Some(flags.p(i));
                    break;
                }
            }
            let p = match open {
                Some(p) => p,
                None => break,
            };
            flags[p] = Flag::None;

            match self.region_of(p) {
                None => {
                    if r.numbered() {
                        // An island cannot take an unknown cell that
                        // touches some other island.
                        let mut rejected = false;
                        for &d in &FOUR_NEIGHBOURS {
                            let q = p + d;
                            if !self.valid(q) {
                                continue;
                            }
                            if let Some(other) = self.region_of(q) {
                                if other != id && self.region(other).numbered() {
                                    rejected = true;
                                }
                            }
                        }
                        if rejected {
                            continue;
                        }
                    }

                    flags[p] = Flag::Closed;
                    closed_size += 1;
                    for &d in &FOUR_NEIGHBOURS {
                        let q = p + d;
                        if self.valid(q) && flags[q] == Flag::None {
                            flags[q] = Flag::Open;
                        }
                    }

                    if verboten.is_empty() {
                        cache.entry(id).or_default().insert(p);
                    }
                }
                Some(other_id) => {
                    let other = self.region(other_id);

                    if r.black() {
                        if !other.black() {
                            continue;
                        }
                    } else if r.white() {
                        if other.black() {
                            continue;
                        }
                        if other.numbered() {
                            // Escaped to an island.
                            return false;
                        }
                    } else {
                        if other.black() {
                            continue;
                        }
                        if other.numbered() {
                            panic!("two numbered regions turned out to be adjacent");
                        }
                    }

                    // Consume the whole neighbouring region.
                    for &q in other.coords() {
                        flags[q] = Flag::Closed;
                    }
                    closed_size += other.size();
                    for &q in other.unknowns() {
                        if flags[q] == Flag::None {
                            flags[q] = Flag::Open;
                        }
                    }
                }
            }
        }

        needs_more(closed_size)
    }

    pub(crate) fn detect_contradictions(&mut self, verbose: bool, cache: &mut CacheMap) -> bool {
        for y in 0..self.height() - 1 {
            for x in 0..self.width() - 1 {
                let pool = [P(y, x), P(y, x + 1), P(y + 1, x), P(y + 1, x + 1)]
                    .iter()
                    .all(|&p| self.cell(p) == State::Black);
                if pool {
                    return self.uh_oh(verbose, "Contradiction found! Pool detected.");
                }
            }
        }

        let mut black_cells = 0;
        let mut white_cells = 0;

        let ids: Vec<RegionId> = self.live_regions().map(|(id, _)| id).collect();
        for id in ids {
            // Counting black cells is strictly stronger than looking for
            // gigantic black regions, so only white and numbered regions
            // get a size check here.
            let gigantic = {
                let r = self.region(id);
                r.white() && self.impossibly_big_white_region(r.size())
                    || r.number().map_or(false, |n| r.size() > n)
            };
            if gigantic {
                return self.uh_oh(verbose, "Contradiction found! Gigantic region detected.");
            }

            let (black, size) = {
                let r = self.region(id);
                (r.black(), r.size())
            };
            if black {
                black_cells += size;
            } else {
                white_cells += size;
            }

            if self.confined(id, cache, &BTreeSet::new()) {
                return self.uh_oh(verbose, "Contradiction found! Confined region detected.");
            }
        }

        if black_cells > self.total_black() {
            return self.uh_oh(verbose, "Contradiction found! Too many black cells detected.");
        }
        if white_cells > self.width() * self.height() - self.total_black() {
            return self.uh_oh(
                verbose,
                "Contradiction found! Too many white/numbered cells detected.",
            );
        }

        false
    }

    fn uh_oh(&mut self, verbose: bool, message: &str) -> bool {
        if verbose {
            self.record_plain(message);
        }
        self.set_sitrep(SitRep::ContradictionFound);
        true
    }

    /// If pretending a single unknown cell unavailable confines some
    /// region, the cell has to take that region's own colour. A second
    /// pass over island liberties also blocks expansions that would
    /// strangle a neighbouring island.
    pub(crate) fn analyze_confinement(&mut self, verbose: bool, cache: &mut CacheMap) -> bool {
        let mut mark_as_black = BTreeSet::new();
        let mut mark_as_white = BTreeSet::new();

        for y in 0..self.height() {
            for x in 0..self.width() {
                let pos = P(y, x);
                if self.cell(pos) != State::Unknown {
                    continue;
                }

                let mut verboten = BTreeSet::new();
                verboten.insert(pos);

                for (id, r) in self.live_regions() {
                    if self.confined(id, cache, &verboten) {
                        if r.black() {
                            mark_as_black.insert(pos);
                        } else {
                            mark_as_white.insert(pos);
                        }
                    }
                }
            }
        }

        // An island liberty whose occupation would confine another
        // island must be black: taking it white would fence that other
        // island off its remaining room.
        for (id, r) in self.live_regions() {
            let partial = r.number().map_or(false, |n| r.size() < n);
            if !partial {
                continue;
            }

            for &u in r.unknowns() {
                let mut verboten = self.unknown_neighbors(u);
                verboten.insert(u);

                for (other, k) in self.live_regions() {
                    if other != id && k.numbered() && self.confined(other, cache, &verboten) {
                        mark_as_black.insert(u);
                    }
                }
            }
        }

        self.process(
            verbose,
            mark_as_black,
            mark_as_white,
            "Confinement analysis succeeded.",
        )
    }

    /// Unknown cells in a deterministic but pseudorandomized order,
    /// prioritised by Manhattan distance to the nearest white cell.
    pub(crate) fn guessing_order(&mut self) -> Vec<P> {
        let mut unknown_cells = Vec::new();
        let mut white_cells = Vec::new();

        for y in 0..self.height() {
            for x in 0..self.width() {
                match self.cell(P(y, x)) {
                    State::Unknown => unknown_cells.push(P(y, x)),
                    State::White => white_cells.push(P(y, x)),
                    _ => {}
                }
            }
        }

        // The greatest possible distance on the grid is width + height
        // minus two, so width + height works as a placeholder.
        let far = self.width() + self.height();

        unknown_cells.shuffle(self.prng());

        let mut keyed: Vec<(i32, P)> = unknown_cells
            .into_iter()
            .map(|p| {
                let mut manhattan = far;
                for &w in &white_cells {
                    manhattan = manhattan.min(p.manhattan(w));
                }
                (manhattan, p)
            })
            .collect();

        // A stable sort preserves the shuffle within each distance rank.
        keyed.sort_by_key(|&(manhattan, _)| manhattan);

        keyed.into_iter().map(|(_, p)| p).collect()
    }

    /// Tries colours on a clone of the grid, cheapest guesses first. A
    /// contradiction proves the opposite colour; a completed clone
    /// proves the guess itself.
    pub(crate) fn analyze_hypotheticals(&mut self, verbose: bool) -> bool {
        let order = self.guessing_order();

        let mut failed_guesses = 0;
        let mut failed_coords = BTreeSet::new();

        for pos in order {
            for &color in &[Color::Black, Color::White] {
                let mut other = self.fork();
                other.mark(color, pos);

                let mut sr = other.solve(false, false);
                while sr == SitRep::KeepGoing {
                    sr = other.solve(false, false);
                }

                let mut mark_as_black = BTreeSet::new();
                let mut mark_as_white = BTreeSet::new();

                match sr {
                    SitRep::ContradictionFound => {
                        match color {
                            Color::Black => mark_as_white.insert(pos),
                            Color::White => mark_as_black.insert(pos),
                        };
                        return self.process_with_failures(
                            verbose,
                            mark_as_black,
                            mark_as_white,
                            "Hypothetical contradiction found.",
                            failed_guesses,
                            failed_coords,
                        );
                    }
                    SitRep::SolutionFound => {
                        match color {
                            Color::Black => mark_as_black.insert(pos),
                            Color::White => mark_as_white.insert(pos),
                        };
                        return self.process_with_failures(
                            verbose,
                            mark_as_black,
                            mark_as_white,
                            "Hypothetical solution found.",
                            failed_guesses,
                            failed_coords,
                        );
                    }
                    _ => {
                        failed_guesses += 1;
                        failed_coords.insert(pos);
                    }
                }
            }
        }

        trace!(failed_guesses, "hypothetical analysis exhausted");
        false
    }
}
