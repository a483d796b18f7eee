//! A deterministic grid world loaded from a text map.
//!
//! Map characters:
//! - `#` wall
//! - `.` floor
//! - `S` start (floor, exactly one)
//! - `G` goal (absorbing, at least one)
//!
//! Every open cell is a state, numbered in row-major order. Each move costs
//! [`STEP_REWARD`]; stepping onto a goal pays [`GOAL_REWARD`] instead. In the
//! model a move into a wall or off the map leaves the agent in place at the usual
//! cost. In a live session such a move is rejected.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ActError, Error, Result};
use crate::mdp::{Environment, LiveEnvironment};

pub const STEP_REWARD: f64 = -1.0;
pub const GOAL_REWARD: f64 = 10.0;

/// The map used when no other map is given.
pub const DEFAULT_MAP: &str = "\
##########
#S...#...#
#.##.#.#.#
#.#..#.#.#
#.#.##.#G#
#...#...##
###...#..#
##########";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    fn delta(self) -> (isize, isize) {
        match self {
            Move::Up => (-1, 0),
            Move::Down => (1, 0),
            Move::Left => (0, -1),
            Move::Right => (0, 1),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Move {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Move::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownAction(s.trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Wall,
    Floor,
    Goal,
}

#[derive(Debug, Clone)]
pub struct GridWorld {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    /// cell index -> state
    state_of: Vec<Option<usize>>,
    /// state -> cell index
    cell_of: Vec<usize>,
    start: usize,
    agent: usize,
}

impl GridWorld {
    /// Parses a map. Trailing blank lines are ignored; all other rows must have the same width.
    pub fn parse(text: &str) -> Result<Self> {
        let rows: Vec<&str> = text.trim_end().lines().map(|l| l.trim_end()).collect();
        if rows.is_empty() || rows[0].is_empty() {
            return Err(Error::MapParse {
                line: 1,
                message: "map is empty".to_string(),
            });
        }
        let width = rows[0].chars().count();

        let mut cells = Vec::with_capacity(width * rows.len());
        let mut start = None;
        for (i, row) in rows.iter().enumerate() {
            let line = i + 1;
            if row.chars().count() != width {
                return Err(Error::MapParse {
                    line,
                    message: format!("expected {width} columns, found {}", row.chars().count()),
                });
            }
            for ch in row.chars() {
                let cell = match ch {
                    '#' => Cell::Wall,
                    '.' => Cell::Floor,
                    'G' => Cell::Goal,
                    'S' => {
                        if start.is_some() {
                            return Err(Error::MapParse {
                                line,
                                message: "more than one start".to_string(),
                            });
                        }
                        start = Some(cells.len());
                        Cell::Floor
                    }
                    other => {
                        return Err(Error::MapParse {
                            line,
                            message: format!("unexpected character {other:?}"),
                        })
                    }
                };
                cells.push(cell);
            }
        }

        let start_cell = start.ok_or_else(|| Error::MapParse {
            line: rows.len(),
            message: "no start (S)".to_string(),
        })?;
        if !cells.contains(&Cell::Goal) {
            return Err(Error::MapParse {
                line: rows.len(),
                message: "no goal (G)".to_string(),
            });
        }

        let mut state_of = vec![None; cells.len()];
        let mut cell_of = Vec::new();
        for (index, cell) in cells.iter().enumerate() {
            if *cell != Cell::Wall {
                state_of[index] = Some(cell_of.len());
                cell_of.push(index);
            }
        }
        let start = state_of[start_cell].ok_or_else(|| Error::MapParse {
            line: 1,
            message: "start is not an open cell".to_string(),
        })?;

        Ok(Self {
            width,
            height: rows.len(),
            cells,
            state_of,
            cell_of,
            start,
            agent: start,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn start_state(&self) -> usize {
        self.start
    }

    /// `(row, column)` of a state.
    pub fn position(&self, state: usize) -> Option<(usize, usize)> {
        self.cell_of
            .get(state)
            .map(|&cell| (cell / self.width, cell % self.width))
    }

    pub fn state_at(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.state_of[row * self.width + col]
    }

    /// State reached by `mv` from `state`, or `None` if a wall or the map edge is in the way.
    fn neighbour(&self, state: usize, mv: Move) -> Option<usize> {
        let (row, col) = self.position(state)?;
        let (dr, dc) = mv.delta();
        let row = row.checked_add_signed(dr)?;
        let col = col.checked_add_signed(dc)?;
        self.state_at(row, col)
    }

    fn is_goal(&self, state: usize) -> bool {
        self.cell_of
            .get(state)
            .is_some_and(|&cell| self.cells[cell] == Cell::Goal)
    }
}

impl Environment for GridWorld {
    type Action = Move;

    fn n_states(&self) -> usize {
        self.cell_of.len()
    }

    fn actions(&self) -> &[Move] {
        &Move::ALL
    }

    fn transition(&self, state: usize, action: &Move) -> (usize, f64) {
        if self.is_goal(state) {
            return (state, 0.0);
        }
        match self.neighbour(state, *action) {
            Some(next) if self.is_goal(next) => (next, GOAL_REWARD),
            Some(next) => (next, STEP_REWARD),
            None => (state, STEP_REWARD),
        }
    }

    fn is_terminal_state(&self, state: usize) -> bool {
        self.is_goal(state)
    }
}

impl LiveEnvironment for GridWorld {
    fn is_terminal(&self) -> bool {
        self.is_goal(self.agent)
    }

    fn reset_agent(&mut self) {
        self.agent = self.start;
    }

    fn current_state(&self) -> usize {
        self.agent
    }

    fn act(&mut self, action: &Move) -> std::result::Result<(), ActError> {
        if self.is_terminal() {
            return Err(ActError::Inapplicable("the goal has been reached".to_string()));
        }
        let next = self
            .neighbour(self.agent, *action)
            .ok_or_else(|| ActError::Inapplicable(format!("moving {action} runs into a wall")))?;
        self.agent = next;
        Ok(())
    }

    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let agent_cell = self.cell_of[self.agent];
        let start_cell = self.cell_of[self.start];
        for row in 0..self.height {
            let line: String = (0..self.width)
                .map(|col| {
                    let index = row * self.width + col;
                    match self.cells[index] {
                        _ if index == agent_cell => '@',
                        Cell::Wall => '#',
                        Cell::Goal => 'G',
                        Cell::Floor if index == start_cell => 'S',
                        Cell::Floor => '.',
                    }
                })
                .collect();
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}
