use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use k13_core::{CompileOutput, compile_file};

#[derive(Parser, Debug)]
#[command(version, about = "Compiles k13 sources to C++", long_about = None)]
struct Cli {
    #[arg(short, long, help = "Path to the .k13 source file")]
    input: String,

    #[arg(
        short,
        long,
        default_value = ".",
        help = "Directory the generated <program>.cpp is written to"
    )]
    output: String,

    #[arg(long, help = "Print the lexeme stream and side tables")]
    dump: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let output = compile_file(&cli.input)
        .with_context(|| format!("failed to compile {}", cli.input))?;

    if cli.dump {
        dump(&output);
    }
    for diagnostic in &output.diagnostics {
        eprintln!("{diagnostic}");
    }

    match &output.translation_unit {
        Some(unit) => {
            let path = write_unit(&cli.output, &output.program_name, unit)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        None => bail!("compilation failed with {} error(s)", output.error_count()),
    }
}

fn write_unit(dir: &str, program_name: &str, unit: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(dir);
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {dir:?}"))?;
    }
    let path = dir.join(format!("{program_name}.cpp"));
    fs::write(&path, unit).with_context(|| format!("failed to write output file {path:?}"))?;
    Ok(path)
}

fn dump(output: &CompileOutput) {
    println!("program: {}", output.program_name);
    println!("lexemes:");
    for lexeme in &output.lexemes {
        match lexeme.table_id {
            Some(id) => println!("  line {:>4}  {:?} #{id}", lexeme.line, lexeme.kind),
            None => println!("  line {:>4}  {:?} {}", lexeme.line, lexeme.kind, lexeme.text),
        }
    }
    if !output.literals.is_empty() {
        println!("literals:");
        for literal in &output.literals {
            println!("  #{} {}", literal.id, literal.raw_text);
        }
    }
    if !output.unknowns.is_empty() {
        println!("unknowns:");
        for unknown in &output.unknowns {
            println!("  #{} {}", unknown.id, unknown.raw_text);
        }
    }
    if !output.variables.is_empty() {
        println!("variables:");
        for (name, ty) in &output.variables {
            println!("  {name}: {ty:?}");
        }
    }
    if !output.identifiers.is_empty() {
        println!("identifier traces:");
        for (name, events) in &output.identifiers {
            print!("  {name}:");
            for event in events {
                print!(" {:?}@{}", event.kind, event.line);
            }
            println!();
        }
    }
    if !output.labels.is_empty() {
        println!("label traces:");
        for (name, events) in &output.labels {
            print!("  {name}:");
            for event in events {
                print!(" {:?}@{}", event.kind, event.line);
            }
            println!();
        }
    }
    if !output.expressions.is_empty() {
        println!("expression buckets:");
        for (context, tokens) in &output.expressions {
            println!("  {context:?}: {} token(s)", tokens.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    const VALID: &str = "\
program demo;
start
var int16_t x;
x := 2 + 3;
put(x);
finish";

    #[test]
    fn compiles_a_valid_program_to_cpp() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.k13");
        fs::write(&input_path, VALID).expect("write input");
        let out_dir = dir.path().join("out");

        Command::cargo_bin("k13-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&out_dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("demo.cpp"));

        let unit = fs::read_to_string(out_dir.join("demo.cpp")).expect("read output");
        assert!(unit.contains("int16_t x;"));
        assert!(unit.contains("x = 2+3;"));
    }

    #[test]
    fn rejects_inputs_without_the_k13_extension() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.pas");
        fs::write(&input_path, VALID).expect("write input");

        Command::cargo_bin("k13-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected a .k13 source file"));
    }

    #[test]
    fn reports_semantic_errors_on_stderr() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.k13");
        fs::write(
            &input_path,
            "program p;\nstart\nvar;\nx := 1;\nfinish",
        )
        .expect("write input");

        Command::cargo_bin("k13-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Semantic error at line"));
    }

    #[test]
    fn warnings_are_printed_but_do_not_fail() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.k13");
        let source = "\
program loops;
start
var int16_t i, s;
s := 0;
i := 0;
for i := 1 to 3 s := s + i; next i;
put(s);
finish";
        fs::write(&input_path, source).expect("write input");

        Command::cargo_bin("k13-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(dir.path())
            .assert()
            .success()
            .stderr(predicate::str::contains("Warning at line"));

        assert!(dir.path().join("loops.cpp").exists());
    }

    #[test]
    fn dump_prints_the_lexeme_stream() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.k13");
        fs::write(&input_path, VALID).expect("write input");

        Command::cargo_bin("k13-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(dir.path())
            .arg("--dump")
            .assert()
            .success()
            .stdout(predicate::str::contains("lexemes:"))
            .stdout(predicate::str::contains("identifier traces:"))
            .stdout(predicate::str::contains("expression buckets:"));
    }
}
