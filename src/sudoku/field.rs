use crate::common::{Grid, P};
use crate::io::ParseError;

use super::{Cand, FULL_CAND};

pub const SIZE_BOX: i32 = 3;
pub const SIZE_GRID: i32 = SIZE_BOX * SIZE_BOX;
const NUM_HOUSES: i32 = SIZE_GRID * 3;

#[derive(Clone, Debug)]
pub struct Field {
    cand: Grid<Cand>,
    inconsistent: bool,
}

/// Returns `pos`-th cell of house `gid` (9 rows, 9 columns, 9 boxes).
fn house(gid: i32, pos: i32) -> P {
    if gid < SIZE_GRID {
        P(gid, pos)
    } else if gid < SIZE_GRID * 2 {
        P(pos, gid - SIZE_GRID)
    } else {
        let b = gid - SIZE_GRID * 2;
        P(
            (b / SIZE_BOX) * SIZE_BOX + pos / SIZE_BOX,
            (b % SIZE_BOX) * SIZE_BOX + pos % SIZE_BOX,
        )
    }
}

impl Field {
    pub fn new() -> Field {
        Field {
            cand: Grid::new(SIZE_GRID, SIZE_GRID, FULL_CAND),
            inconsistent: false,
        }
    }

    /// Parses nine lines of nine digits; `0` marks an empty cell.
    pub fn parse(s: &str) -> Result<Field, ParseError> {
        let mut givens = Vec::new();
        for c in s.chars() {
            match c {
                '0'..='9' => givens.push((c as u8 - b'0') as i32),
                '\n' => {}
                _ => return Err(ParseError::BadCharacter(c)),
            }
        }
        if givens.len() != (SIZE_GRID * SIZE_GRID) as usize {
            return Err(ParseError::WrongCellCount {
                expected: (SIZE_GRID * SIZE_GRID) as usize,
                found: givens.len(),
            });
        }

        let mut field = Field::new();
        for (i, &n) in givens.iter().enumerate() {
            if n > 0 {
                let pos = field.cand.p(i);
                field.decide(pos, n);
            }
        }
        Ok(field)
    }

    pub fn inconsistent(&self) -> bool {
        self.inconsistent
    }
    fn set_inconsistent(&mut self) {
        self.inconsistent = true;
    }

    pub fn value(&self, pos: P) -> Option<i32> {
        self.cand[pos].single()
    }

    pub fn solved(&self) -> bool {
        self.cand.cells().all(|(_, c)| c.single().is_some())
    }

    pub fn total_cands(&self) -> i32 {
        self.cand.cells().map(|(_, c)| c.count()).sum()
    }

    pub fn decide(&mut self, pos: P, n: i32) {
        if !self.cand[pos].is_set(n) {
            self.set_inconsistent();
            return;
        }
        self.cand[pos] = Cand::singleton(n);
    }

    fn remove_candidate(&mut self, pos: P, n: i32) {
        if self.cand[pos].is_set(n) {
            self.cand[pos].remove(n);
            if self.cand[pos].is_empty() {
                self.set_inconsistent();
            }
        }
    }

    /// Removes every solved digit from the other cells of its houses.
    fn eliminate(&mut self) {
        for gid in 0..NUM_HOUSES {
            for i in 0..SIZE_GRID {
                let p = house(gid, i);
                if let Some(n) = self.cand[p].single() {
                    for j in 0..SIZE_GRID {
                        if i != j {
                            self.remove_candidate(house(gid, j), n);
                        }
                    }
                }
            }
        }
    }

    /// Solves cells holding a candidate that appears nowhere else in one
    /// of their houses.
    fn hidden_singles(&mut self) {
        for gid in 0..NUM_HOUSES {
            for i in 0..SIZE_GRID {
                let p = house(gid, i);
                if self.cand[p].single().is_some() {
                    continue;
                }
                for n in 1..=SIZE_GRID {
                    if !self.cand[p].is_set(n) {
                        continue;
                    }
                    let elsewhere = (0..SIZE_GRID)
                        .any(|j| i != j && self.cand[house(gid, j)].is_set(n));
                    if !elsewhere {
                        self.decide(p, n);
                        break;
                    }
                }
            }
        }
    }

    /// Two cells of a house sharing the same two candidates claim both
    /// digits; the rest of the house loses them.
    fn naked_pairs(&mut self) {
        for gid in 0..NUM_HOUSES {
            for i in 0..SIZE_GRID {
                let pi = house(gid, i);
                if self.cand[pi].count() != 2 {
                    continue;
                }
                for j in (i + 1)..SIZE_GRID {
                    let pj = house(gid, j);
                    if self.cand[pj] != self.cand[pi] {
                        continue;
                    }
                    let pair = self.cand[pi];
                    for k in 0..SIZE_GRID {
                        if k == i || k == j {
                            continue;
                        }
                        for n in 1..=SIZE_GRID {
                            if pair.is_set(n) {
                                self.remove_candidate(house(gid, k), n);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Applies the techniques until the candidate count stops falling.
    pub fn apply_methods(&mut self) {
        loop {
            let current_cands = self.total_cands();

            self.eliminate();
            if self.inconsistent() {
                return;
            }
            self.hidden_singles();
            if self.inconsistent() {
                return;
            }
            self.naked_pairs();
            if self.inconsistent() {
                return;
            }

            if self.total_cands() == current_cands {
                break;
            }
        }
    }

    pub fn solve(&mut self) -> bool {
        self.apply_methods();
        !self.inconsistent() && self.solved()
    }

    /// Picks a cell with two candidates and tests each on a clone; the
    /// branch whose deduction completes is adopted.
    pub fn solve_by_guessing(&mut self) -> bool {
        for y in 0..SIZE_GRID {
            for x in 0..SIZE_GRID {
                let pos = P(y, x);
                if self.cand[pos].count() != 2 {
                    continue;
                }
                let first = match self.cand[pos].smallest() {
                    Some(n) => n,
                    None => continue,
                };

                let mut trial = self.clone();
                trial.decide(pos, first);
                if trial.solve() {
                    *self = trial;
                    return true;
                }

                let mut other = self.clone();
                other.remove_candidate(pos, first);
                if other.solve() {
                    *self = other;
                    return true;
                }
            }
        }
        false
    }
}

impl Default for Field {
    fn default() -> Field {
        Field::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Project Euler problem 96, grid 1
    const EASY: &str = "003020600\n\
                        900305001\n\
                        001806400\n\
                        008102900\n\
                        700000008\n\
                        006708200\n\
                        002609500\n\
                        800203009\n\
                        005010300\n";

    const EASY_SOLUTION: [[i32; 9]; 9] = [
        [4, 8, 3, 9, 2, 1, 6, 5, 7],
        [9, 6, 7, 3, 4, 5, 8, 2, 1],
        [2, 5, 1, 8, 7, 6, 4, 9, 3],
        [5, 4, 8, 1, 3, 2, 9, 7, 6],
        [7, 2, 9, 5, 6, 4, 1, 3, 8],
        [1, 3, 6, 7, 9, 8, 2, 4, 5],
        [3, 7, 2, 6, 8, 9, 5, 1, 4],
        [8, 1, 4, 2, 5, 3, 7, 6, 9],
        [6, 9, 5, 4, 1, 7, 3, 8, 2],
    ];

    fn assert_houses_are_permutations(f: &Field) {
        for gid in 0..NUM_HOUSES {
            let mut seen = 0u32;
            for i in 0..SIZE_GRID {
                let n = f.value(house(gid, i)).unwrap();
                seen |= 1 << (n - 1);
            }
            assert_eq!(seen, (1 << 9) - 1, "house {} is not a permutation", gid);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Field::parse("123").unwrap_err(),
            ParseError::WrongCellCount {
                expected: 81,
                found: 3
            }
        );
        assert_eq!(
            Field::parse("12x").unwrap_err(),
            ParseError::BadCharacter('x')
        );
    }

    #[test]
    fn test_solves_easy_grid() {
        let mut f = Field::parse(EASY).unwrap();
        assert!(f.solve() || f.solve_by_guessing());
        assert!(f.solved());
        assert_houses_are_permutations(&f);

        for y in 0..SIZE_GRID {
            for x in 0..SIZE_GRID {
                assert_eq!(
                    f.value(P(y, x)),
                    Some(EASY_SOLUTION[y as usize][x as usize])
                );
            }
        }
    }

    #[test]
    fn test_duplicate_digit_is_inconsistent() {
        let mut s = String::from("550000000\n");
        for _ in 0..8 {
            s.push_str("000000000\n");
        }
        let mut f = Field::parse(&s).unwrap();
        assert!(!f.solve());
        assert!(f.inconsistent());
    }

    #[test]
    fn test_naked_pairs_prune() {
        let mut f = Field::new();
        // two cells of the top row locked to {1, 2}
        f.cand[P(0, 0)] = Cand(0b11);
        f.cand[P(0, 1)] = Cand(0b11);
        f.naked_pairs();
        assert!(!f.inconsistent());
        for x in 2..SIZE_GRID {
            assert!(!f.cand[P(0, x)].is_set(1));
            assert!(!f.cand[P(0, x)].is_set(2));
            assert_eq!(f.cand[P(0, x)].count(), 7);
        }
        // the untouched second row still has everything
        assert_eq!(f.cand[P(1, 8)], FULL_CAND);
    }
}
