use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use puzz_nuri::nurikabe::{format_time, Field, SitRep};

#[derive(Parser)]
#[command(about = "Solves the bundled Nurikabe puzzles and renders HTML solving logs")]
struct Args {
    /// Solve only the puzzle with this name.
    #[arg(long)]
    puzzle: Option<String>,

    /// Directory for the HTML logs and the JSON summary.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Serialize)]
struct Summary<'a> {
    name: &'a str,
    width: i32,
    height: i32,
    status: &'a str,
    known: i32,
    cells: i32,
    elapsed_ms: f64,
}

const PUZZLES: &[(&str, i32, i32, &str)] = &[
    (
        "wikipedia_hard",
        10,
        9,
        concat!(
            "2        2\n",
            "      2   \n",
            " 2  7     \n",
            "          \n",
            "      3 3 \n",
            "  2    3  \n",
            "2  4      \n",
            "          \n",
            " 1    2 4 \n",
        ),
    ),
    (
        "wikipedia_easy",
        10,
        10,
        concat!(
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
        ),
    ),
    (
        "nikoli_1",
        10,
        10,
        concat!(
            "       5 2\n",
            "3         \n",
            " 4  2     \n",
            "      3   \n",
            " 4   4    \n",
            "         3\n",
            "          \n",
            "          \n",
            " 3  3     \n",
            "  1  1 3 3\n",
        ),
    ),
    (
        "nikoli_2",
        10,
        10,
        concat!(
            "6 2 3    3\n",
            "          \n",
            "         4\n",
            "          \n",
            "    2    2\n",
            "3    5    \n",
            "          \n",
            "3         \n",
            "          \n",
            "4    5 4 1\n",
        ),
    ),
    (
        "nikoli_3",
        10,
        10,
        concat!(
            " 3    4   \n",
            "     6    \n",
            "       2  \n",
            "      3   \n",
            "        2 \n",
            " 4     3  \n",
            "         1\n",
            " 10      3 \n",
            "          \n",
            "  3      2\n",
        ),
    ),
    (
        "nikoli_4",
        18,
        10,
        concat!(
            "  4            1 3\n",
            " 3    5   1 2     \n",
            "       5 3        \n",
            "            2 3   \n",
            "  4             3 \n",
            " 3             4  \n",
            "   1 1            \n",
            "        3 4       \n",
            "     1 1   5    5 \n",
            "4 4            3  \n",
        ),
    ),
    (
        "nikoli_5",
        18,
        10,
        concat!(
            " 1 1    1     1   \n",
            "    5    2     1  \n",
            "        1     1   \n",
            "     5         1  \n",
            "1 1       4   1   \n",
            " 1     3     7    \n",
            "  3              6\n",
            "    4   2  4      \n",
            "      5         5 \n",
            " 1           5    \n",
        ),
    ),
    (
        "nikoli_6",
        18,
        10,
        concat!(
            "                  \n",
            "1    12     3 12    \n",
            "                 2\n",
            "2    3     3    3 \n",
            "    1     1       \n",
            "3    1            \n",
            "   2  2 3 2       \n",
            "2           1     \n",
            "  3               \n",
            "1              12 1\n",
        ),
    ),
    (
        "nikoli_7",
        24,
        14,
        concat!(
            "    5                   \n",
            "          2 6    7 3   4\n",
            "  1    5        3 5     \n",
            " 7   6                 1\n",
            "        4               \n",
            "   1      1   5      3  \n",
            "  2  3                  \n",
            "        3   3   2  7    \n",
            "                        \n",
            "6   1    5   5   1    5 \n",
            "      6        5     3  \n",
            "   4               4    \n",
            " 5          1           \n",
            "        3 4     5       \n",
        ),
    ),
    (
        "nikoli_8",
        24,
        14,
        concat!(
            "    2 1           5 5   \n",
            "  4             12     1 \n",
            " 7      1               \n",
            "              1        3\n",
            "          7             \n",
            "6            5          \n",
            "           6           1\n",
            "9           15           \n",
            "          3            3\n",
            "             8          \n",
            "2        8              \n",
            "               4      3 \n",
            " 4     5             3  \n",
            "   8 3           2 4    \n",
        ),
    ),
    (
        "nikoli_9",
        36,
        20,
        concat!(
            "2   2  1  1               1         \n",
            "   4    3        9      8      5    \n",
            "      1        7                   5\n",
            "4      1  1  4              2    1  \n",
            "      2  3         2         1 3    \n",
            "4   2           5    2              \n",
            "       1  1 17          3 4        4 \n",
            "                 9              21  2\n",
            "2       2                 4         \n",
            "  7  4            3   13             \n",
            "          1               6    1    \n",
            "  4      2    9  1                  \n",
            "     6               3          9   \n",
            "22                  1      8  1      \n",
            "   1   6   1   4                    \n",
            "    2     2     1      1       1   1\n",
            "                  4     2           \n",
            "   3 3   2   2       8      2     3 \n",
            "            1              1        \n",
            "                3       5       5   \n",
        ),
    ),
    (
        "nikoli_10",
        36,
        20,
        concat!(
            "           4            2           \n",
            "3 4          2   7         8      2 \n",
            "    7      5   1   8 5   1  2  4   2\n",
            "6    4       3          2 2         \n",
            "           6                   4    \n",
            "    2             1  2           2  \n",
            "        1       4     4    4  1     \n",
            " 1                  3            4 4\n",
            "     2     4  4            4        \n",
            "       5  3                   2 4   \n",
            " 5 1              1    3   8   2    \n",
            "     1   2                          \n",
            "2            2 5           4     2 1\n",
            "                             2      \n",
            "1  2   4  7   18   1            1   1\n",
            "                     2   8 4        \n",
            "    3           18     1          4  \n",
            "                 4                4 \n",
            "      3 1   4      4    2    4   4  \n",
            "6      1  3                 4       \n",
        ),
    ),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut summaries = Vec::new();

    for &(name, width, height, s) in PUZZLES {
        if let Some(filter) = &args.puzzle {
            if filter != name {
                continue;
            }
        }

        let start = Instant::now();
        let mut field =
            Field::new(width, height, s).with_context(|| format!("parsing {}", name))?;
        let sr = field.run(true);
        let finish = Instant::now();

        let path = args.out.join(format!("{}.html", name));
        let mut out = BufWriter::new(
            File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        );
        field
            .write(&mut out, start, finish)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(name, path = %path.display(), "wrote solving log");

        let known = field.known();
        let cells = width * height;
        println!(
            "{}: {}, {}/{} ({:.1}%) solved",
            name,
            format_time(finish - start),
            known,
            cells,
            known as f64 * 100.0 / cells as f64
        );

        summaries.push(Summary {
            name,
            width,
            height,
            status: match sr {
                SitRep::SolutionFound => "solution_found",
                SitRep::ContradictionFound => "contradiction_found",
                SitRep::CannotProceed => "cannot_proceed",
                SitRep::KeepGoing => "keep_going",
            },
            known,
            cells,
            elapsed_ms: (finish - start).as_secs_f64() * 1000.0,
        });
    }

    let path = args.out.join("summary.json");
    let json = serde_json::to_string_pretty(&summaries)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;

    Ok(())
}
