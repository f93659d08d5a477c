use std::collections::BTreeSet;
use std::mem;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::common::{Grid, FOUR_NEIGHBOURS, P};
use crate::io::ParseError;

use super::analysis::{CacheMap, ANALYSES};
use super::io::parse_clues;
use super::{Color, Region, RegionId, SitRep, State};

/// One entry of the solving log, rendered to HTML by `Field::write`.
#[derive(Debug)]
pub(super) struct Step {
    pub(super) message: String,
    pub(super) snapshot: Grid<State>,
    pub(super) updated: BTreeSet<P>,
    pub(super) at: Instant,
    pub(super) failed_guesses: i32,
    pub(super) failed_coords: BTreeSet<P>,
}

#[derive(Debug)]
pub struct Field {
    width: i32,
    height: i32,
    // The number of black cells in any solution: width * height minus
    // the sum of all clues. Lets partial-vs-complete tests on black
    // regions be simple size comparisons.
    total_black: i32,
    cell: Grid<State>,
    owner: Grid<Option<RegionId>>,
    arena: Vec<Option<Region>>,
    sitrep: SitRep,
    prng: ChaCha8Rng,
    log: Vec<Step>,
}

impl Field {
    pub fn new(width: i32, height: i32, s: &str) -> Result<Field, ParseError> {
        if width < 1 || height < 1 {
            return Err(ParseError::BadDimensions);
        }

        let v = parse_clues(s)?;

        // The count can only be validated after tokenizing: numbers of
        // 10 and above occupy several characters.
        if v.len() != (width * height) as usize {
            return Err(ParseError::WrongCellCount {
                expected: (width * height) as usize,
                found: v.len(),
            });
        }

        let mut field = Field {
            width,
            height,
            total_black: width * height,
            cell: Grid::new(height, width, State::Unknown),
            owner: Grid::new(height, width, None),
            arena: Vec::new(),
            sitrep: SitRep::KeepGoing,
            prng: ChaCha8Rng::seed_from_u64(1729),
            log: Vec::new(),
        };

        for y in 0..height {
            for x in 0..width {
                let n = v[(y * width + x) as usize];
                if n > 0 {
                    let pos = P(y, x);

                    // Horizontally adjacent numbers cannot occur: their
                    // digits would have been concatenated. Only the cell
                    // above needs checking; the cell below is caught on a
                    // later row.
                    if y > 0 && matches!(field.cell[P(y - 1, x)], State::Numbered(_)) {
                        return Err(ParseError::AdjacentClues);
                    }

                    field.cell[pos] = State::Numbered(n);
                    field.add_region(pos);
                    field.total_black -= n;
                }
            }
        }

        field.record_plain("I'm okay to go!");
        Ok(field)
    }

    pub fn width(&self) -> i32 {
        self.width
    }
    pub fn height(&self) -> i32 {
        self.height
    }
    pub fn sitrep(&self) -> SitRep {
        self.sitrep
    }
    pub(crate) fn set_sitrep(&mut self, sitrep: SitRep) {
        self.sitrep = sitrep;
    }
    pub fn cell(&self, pos: P) -> State {
        self.cell[pos]
    }
    pub(crate) fn total_black(&self) -> i32 {
        self.total_black
    }

    pub fn known(&self) -> i32 {
        self.cell
            .cells()
            .filter(|&(_, &s)| s != State::Unknown)
            .count() as i32
    }

    pub(crate) fn valid(&self, pos: P) -> bool {
        self.cell.is_valid_p(pos)
    }

    pub(crate) fn region_of(&self, pos: P) -> Option<RegionId> {
        self.owner[pos]
    }

    pub(crate) fn region(&self, id: RegionId) -> &Region {
        match &self.arena[id.0] {
            Some(r) => r,
            None => panic!("stale region handle"),
        }
    }

    pub(crate) fn live_regions(&self) -> impl Iterator<Item = (RegionId, &Region)> {
        self.arena
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (RegionId(i), r)))
    }

    pub(crate) fn unknown_neighbors(&self, pos: P) -> BTreeSet<P> {
        let mut ret = BTreeSet::new();
        for &d in &FOUR_NEIGHBOURS {
            let q = pos + d;
            if self.valid(q) && self.cell[q] == State::Unknown {
                ret.insert(q);
            }
        }
        ret
    }

    fn add_region(&mut self, pos: P) {
        let unknowns = self.unknown_neighbors(pos);
        let id = RegionId(self.arena.len());
        self.arena
            .push(Some(Region::new(self.cell[pos], pos, unknowns)));
        self.owner[pos] = Some(id);
    }

    /// Commits a deduced colour. Marking an already known cell is a
    /// contradiction, remembered in the sitrep for the driver to report.
    pub(crate) fn mark(&mut self, color: Color, pos: P) {
        if self.cell[pos] != State::Unknown {
            self.sitrep = SitRep::ContradictionFound;
            return;
        }

        self.cell[pos] = color.state();

        // The cell is known now, so it is nobody's liberty any more.
        for region in self.arena.iter_mut().flatten() {
            region.forget_unknown(pos);
        }

        // The new cell could stand alone, extend one region, or join up
        // to four of them. Make a singleton region and fuse it with every
        // compatible neighbour.
        self.add_region(pos);

        for &d in &FOUR_NEIGHBOURS {
            let q = pos + d;
            if self.valid(q) {
                self.fuse_regions(self.owner[pos], self.owner[q]);
            }
        }
    }

    fn fuse_regions(&mut self, a: Option<RegionId>, b: Option<RegionId>) {
        let (mut a, mut b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        if a == b {
            return;
        }

        // Joining two numbered regions is a contradiction, remembered for
        // the driver. Black fuses only with black; a mismatch fuses
        // nothing.
        if self.region(a).numbered() && self.region(b).numbered() {
            self.sitrep = SitRep::ContradictionFound;
            return;
        }
        if self.region(a).black() != self.region(b).black() {
            return;
        }

        // Absorb the smaller region into the bigger one, except that a
        // numbered region always survives a white one, so that the fused
        // region stays numbered.
        if self.region(b).size() > self.region(a).size() {
            mem::swap(&mut a, &mut b);
        }
        if self.region(b).numbered() {
            mem::swap(&mut a, &mut b);
        }

        let secondary = match self.arena[b.0].take() {
            Some(r) => r,
            None => panic!("stale region handle"),
        };
        for &p in secondary.coords() {
            self.owner[p] = Some(a);
        }
        match &mut self.arena[a.0] {
            Some(r) => r.absorb(secondary),
            None => panic!("stale region handle"),
        }
    }

    pub(super) fn record(
        &mut self,
        message: &str,
        updated: BTreeSet<P>,
        failed_guesses: i32,
        failed_coords: BTreeSet<P>,
    ) {
        self.log.push(Step {
            message: message.to_string(),
            snapshot: self.cell.clone(),
            updated,
            at: Instant::now(),
            failed_guesses,
            failed_coords,
        });
    }

    pub(super) fn record_plain(&mut self, message: &str) {
        self.record(message, BTreeSet::new(), 0, BTreeSet::new());
    }

    pub(super) fn steps(&self) -> &[Step] {
        &self.log
    }

    pub(crate) fn process(
        &mut self,
        verbose: bool,
        mark_as_black: BTreeSet<P>,
        mark_as_white: BTreeSet<P>,
        message: &str,
    ) -> bool {
        self.process_with_failures(verbose, mark_as_black, mark_as_white, message, 0, BTreeSet::new())
    }

    pub(crate) fn process_with_failures(
        &mut self,
        verbose: bool,
        mark_as_black: BTreeSet<P>,
        mark_as_white: BTreeSet<P>,
        message: &str,
        failed_guesses: i32,
        failed_coords: BTreeSet<P>,
    ) -> bool {
        if mark_as_black.is_empty() && mark_as_white.is_empty() {
            return false;
        }

        for &p in &mark_as_black {
            self.mark(Color::Black, p);
        }
        for &p in &mark_as_white {
            self.mark(Color::White, p);
        }

        if verbose {
            let mut updated = mark_as_black;
            updated.extend(mark_as_white);

            let mut t = message.to_string();
            if self.sitrep == SitRep::ContradictionFound {
                t += " (Contradiction found! Attempted to fuse two numbered regions \
                      or mark an already known cell.)";
            }

            self.record(&t, updated, failed_guesses, failed_coords);
        }

        true
    }

    /// Runs one pass of the analysis pipeline, cheapest step first, and
    /// stops at the first one that changes the grid.
    pub fn solve(&mut self, verbose: bool, guessing: bool) -> SitRep {
        let mut cache = CacheMap::new();

        // Before declaring victory, look for contradictions.
        if self.known() == self.width * self.height {
            if self.detect_contradictions(verbose, &mut cache) {
                return SitRep::ContradictionFound;
            }
            if verbose {
                self.record_plain("I'm done!");
            }
            return SitRep::SolutionFound;
        }

        for rule in ANALYSES {
            if rule(self, verbose) {
                return self.sitrep;
            }
        }

        // Contradiction detection just before confinement analysis fills
        // the confinement cache that the analysis then consults.
        if self.detect_contradictions(verbose, &mut cache)
            || self.analyze_confinement(verbose, &mut cache)
            || (guessing && self.analyze_hypotheticals(verbose))
        {
            return self.sitrep;
        }

        if verbose {
            self.record_plain("I'm stumped!");
        }
        SitRep::CannotProceed
    }

    /// Loops `solve` until it reaches a terminal situation.
    pub fn run(&mut self, verbose: bool) -> SitRep {
        loop {
            let sr = self.solve(verbose, true);
            debug!(?sr, known = self.known(), "solve pass");
            if sr != SitRep::KeepGoing {
                return sr;
            }
        }
    }

    /// An independent copy for hypothetical analysis. Regions are plain
    /// values in the arena, so cloning it cannot alias the original; the
    /// log is deliberately left behind.
    pub(crate) fn fork(&self) -> Field {
        Field {
            width: self.width,
            height: self.height,
            total_black: self.total_black,
            cell: self.cell.clone(),
            owner: self.owner.clone(),
            arena: self.arena.clone(),
            sitrep: self.sitrep,
            prng: self.prng.clone(),
            log: Vec::new(),
        }
    }

    pub(crate) fn prng(&mut self) -> &mut ChaCha8Rng {
        &mut self.prng
    }
}

#[cfg(test)]
pub(super) fn check_invariants(f: &Field) {
    use std::collections::BTreeMap;

    let mut seen: BTreeMap<P, RegionId> = BTreeMap::new();

    let mut black_total = 0;
    for (id, r) in f.live_regions() {
        assert!(r.size() >= 1);

        // coords are 4-connected
        let start = *r.coords().iter().next().unwrap();
        let mut visited = BTreeSet::new();
        let mut queue = vec![start];
        visited.insert(start);
        while let Some(p) = queue.pop() {
            for &d in &FOUR_NEIGHBOURS {
                let q = p + d;
                if r.contains(q) && visited.insert(q) {
                    queue.push(q);
                }
            }
        }
        assert_eq!(visited.len(), r.coords().len(), "region must be connected");

        // liberties are exactly the unknown neighbours of the members
        let mut expected = BTreeSet::new();
        for &p in r.coords() {
            expected.extend(f.unknown_neighbors(p));
        }
        assert_eq!(r.unknowns(), &expected);

        if let Some(n) = r.number() {
            assert!(r.size() <= n, "a numbered region must not exceed its clue");
        }
        if r.black() {
            black_total += r.size();
        }

        for &p in r.coords() {
            assert_eq!(f.region_of(p), Some(id));
            assert!(seen.insert(p, id).is_none(), "cells belong to one region");
        }
    }
    assert!(black_total <= f.total_black());

    for (p, &s) in f.cell.cells() {
        if s == State::Unknown {
            assert_eq!(f.region_of(p), None);
        } else {
            assert!(seen.contains_key(&p));
        }
    }

    // no two numbered regions are 4-adjacent
    for (p, &s) in f.cell.cells() {
        if let State::Numbered(_) = s {
            for &d in &FOUR_NEIGHBOURS {
                let q = p + d;
                if f.valid(q) && matches!(f.cell(q), State::Numbered(_)) {
                    assert_eq!(f.region_of(p), f.region_of(q));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhaust(f: &mut Field, guessing: bool) -> SitRep {
        loop {
            let sr = f.solve(false, guessing);
            if sr != SitRep::KeepGoing {
                return sr;
            }
        }
    }

    /// A fully known grid must have islands of exactly their clue size,
    /// a single black sea of the right size, and no 2x2 black pool.
    fn verify_solution(f: &Field) {
        assert_eq!(f.known(), f.width() * f.height());
        check_invariants(f);

        let mut black_cells = 0;
        for y in 0..f.height() {
            for x in 0..f.width() {
                if f.cell(P(y, x)) == State::Black {
                    black_cells += 1;
                }
            }
        }
        assert_eq!(black_cells, f.total_black());

        for (_, r) in f.live_regions() {
            if let Some(n) = r.number() {
                assert_eq!(r.size(), n);
            }
            if r.black() {
                assert_eq!(r.size(), f.total_black());
            }
            assert!(!r.white(), "no white region may be left unconnected");
        }

        for y in 0..f.height() - 1 {
            for x in 0..f.width() - 1 {
                let pool = [P(y, x), P(y, x + 1), P(y + 1, x), P(y + 1, x + 1)]
                    .iter()
                    .all(|&p| f.cell(p) == State::Black);
                assert!(!pool, "pool at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Field::new(0, 3, "").unwrap_err(),
            ParseError::BadDimensions
        );
        assert_eq!(
            Field::new(2, 2, "12 3\n\n").unwrap_err(),
            ParseError::WrongCellCount {
                expected: 4,
                found: 3
            }
        );
        // "12" and "34" tokenize as two numbers, not four cells
        assert!(Field::new(2, 2, "12\n34\n").is_err());
        assert_eq!(
            Field::new(2, 2, "1 \n2 \n").unwrap_err(),
            ParseError::AdjacentClues
        );
        assert_eq!(
            Field::new(2, 2, "1 x \n").unwrap_err(),
            ParseError::BadCharacter('x')
        );
    }

    #[test]
    fn test_construction() {
        let f = Field::new(10, 9, WIKIPEDIA_HARD).unwrap();
        assert_eq!(f.known(), 14);
        assert_eq!(f.total_black(), 90 - 39);
        assert_eq!(f.cell(P(0, 0)), State::Numbered(2));
        assert_eq!(f.cell(P(2, 4)), State::Numbered(7));
        assert_eq!(f.cell(P(1, 1)), State::Unknown);
        check_invariants(&f);
    }

    #[test]
    fn test_mark_fuses_regions() {
        let mut f = Field::new(3, 3, "2        ").unwrap();
        f.mark(Color::White, P(0, 1));
        check_invariants(&f);

        // the white cell joined the island and the result is numbered
        let id = f.region_of(P(0, 1)).unwrap();
        assert_eq!(f.region_of(P(0, 0)), Some(id));
        assert!(f.region(id).numbered());
        assert_eq!(f.region(id).size(), 2);

        f.mark(Color::Black, P(2, 0));
        f.mark(Color::Black, P(2, 1));
        check_invariants(&f);
        let black = f.region_of(P(2, 0)).unwrap();
        assert_eq!(f.region_of(P(2, 1)), Some(black));
        assert!(f.region(black).black());
        assert_eq!(f.sitrep(), SitRep::KeepGoing);
    }

    #[test]
    fn test_marking_known_cell_is_contradiction() {
        let mut f = Field::new(3, 3, "2        ").unwrap();
        f.mark(Color::Black, P(1, 1));
        assert_eq!(f.sitrep(), SitRep::KeepGoing);
        f.mark(Color::White, P(1, 1));
        assert_eq!(f.sitrep(), SitRep::ContradictionFound);
    }

    #[test]
    fn test_fusing_two_numbered_regions_is_contradiction() {
        // a white cell between two clues would join their islands
        let mut f = Field::new(3, 1, "1 2").unwrap();
        f.mark(Color::White, P(0, 1));
        assert_eq!(f.sitrep(), SitRep::ContradictionFound);
    }

    #[test]
    fn test_rules_only_puzzle() {
        let mut f = Field::new(2, 3, "1 \n  \n 2\n").unwrap();
        assert_eq!(exhaust(&mut f, false), SitRep::SolutionFound);
        verify_solution(&f);
        assert_eq!(f.cell(P(0, 1)), State::Black);
        assert_eq!(f.cell(P(1, 0)), State::Black);
        assert_eq!(f.cell(P(1, 1)), State::Black);
        assert_eq!(f.cell(P(2, 0)), State::White);
    }

    #[test]
    fn test_confinement_only_puzzle() {
        let mut f = Field::new(3, 3, "9        ").unwrap();
        assert_eq!(exhaust(&mut f, false), SitRep::SolutionFound);
        assert_eq!(f.known(), 9);
        let id = f.region_of(P(0, 0)).unwrap();
        assert_eq!(f.region(id).size(), 9);
    }

    #[test]
    fn test_ambiguous_puzzle_needs_guessing() {
        // the island can grow right or down; only a hypothetical solution
        // can settle it
        let mut f = Field::new(2, 2, "2   ").unwrap();
        assert_eq!(exhaust(&mut f, false), SitRep::CannotProceed);

        let mut f = Field::new(2, 2, "2   ").unwrap();
        assert_eq!(f.run(false), SitRep::SolutionFound);
        verify_solution(&f);
    }

    #[test]
    fn test_contradictory_puzzles_terminate() {
        // the clue sum exceeds the grid, and the middle cell cannot serve
        // two islands
        let mut f = Field::new(3, 1, "1 2").unwrap();
        assert_eq!(f.run(false), SitRep::ContradictionFound);

        // the 8 island is fenced away from the two cells bordering the 1
        // island and cannot reach its size
        let mut f = Field::new(3, 3, "1  \n 8 \n   \n").unwrap();
        assert_eq!(f.run(false), SitRep::ContradictionFound);
    }

    #[test]
    fn test_solved_grid_is_stable() {
        let mut f = Field::new(2, 3, "1 \n  \n 2\n").unwrap();
        assert_eq!(exhaust(&mut f, false), SitRep::SolutionFound);

        let before: Vec<State> = (0..6).map(|i| f.cell(f_pos(&f, i))).collect();
        assert_eq!(f.solve(false, true), SitRep::SolutionFound);
        let after: Vec<State> = (0..6).map(|i| f.cell(f_pos(&f, i))).collect();
        assert_eq!(before, after);
    }

    fn f_pos(f: &Field, i: i32) -> P {
        P(i / f.width(), i % f.width())
    }

    pub(crate) const WIKIPEDIA_HARD: &str = concat!(
        "2        2\n",
        "      2   \n",
        " 2  7     \n",
        "          \n",
        "      3 3 \n",
        "  2    3  \n",
        "2  4      \n",
        "          \n",
        " 1    2 4 \n",
    );

    pub(crate) const WIKIPEDIA_EASY: &str = concat!(
        "1   4  4 2\n",
        "          \n",
        " 1   2    \n",
        "  1   1  2\n",
        "1    3    \n",
        "  6      5\n",
        "          \n",
        "     1   2\n",
        "    2  2  \n",
        "          \n",
    );

    #[test]
    fn test_wikipedia_hard() {
        let mut f = Field::new(10, 9, WIKIPEDIA_HARD).unwrap();
        assert_eq!(f.run(false), SitRep::SolutionFound);
        verify_solution(&f);
    }

    #[test]
    fn test_wikipedia_easy() {
        let mut f = Field::new(10, 10, WIKIPEDIA_EASY).unwrap();
        assert_eq!(f.run(false), SitRep::SolutionFound);
        verify_solution(&f);
    }
}
