//! Synthetic Student Batch Generator
//!
//! Writes a random upload in the 36-column student layout for exercising
//! the prediction pipeline. A defect rate injects missing and non-numeric
//! cells so validation failures can be reproduced.

use rand::seq::SliceRandom;
use rand::Rng;
use student_outcome_pipeline::schema::STUDENT_FEATURES;
use tracing::info;

/// Student record generator
struct StudentGenerator {
    rng: rand::rngs::ThreadRng,
}

impl StudentGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// One row of feature values, in schema order
    fn generate(&mut self, struggling: bool) -> Vec<String> {
        let rng = &mut self.rng;
        let mut row = Vec::with_capacity(STUDENT_FEATURES.len());

        // Enrolment and background
        row.push(rng.gen_range(1..=6).to_string()); // Marital status
        row.push([1, 17, 18, 39, 43, 44].choose(rng).copied().unwrap_or(1).to_string());
        row.push(rng.gen_range(0..=9).to_string()); // Application order
        row.push([33, 171, 8014, 9003, 9070, 9119, 9147, 9238, 9254, 9500].choose(rng).copied().unwrap_or(9500).to_string());
        row.push(u8::from(rng.gen_bool(0.9)).to_string()); // Daytime/evening attendance
        row.push(rng.gen_range(1..=19).to_string()); // Previous qualification
        row.push(format!("{:.1}", rng.gen_range(95.0..190.0)));
        row.push(if rng.gen_bool(0.97) { "1".to_string() } else { rng.gen_range(2..=109).to_string() });
        for _ in 0..2 {
            row.push(rng.gen_range(1..=44).to_string()); // Parents' qualification
        }
        for _ in 0..2 {
            row.push(rng.gen_range(0..=10).to_string()); // Parents' occupation
        }
        row.push(format!("{:.1}", rng.gen_range(95.0..190.0))); // Admission grade
        row.push(u8::from(rng.gen_bool(0.55)).to_string()); // Displaced
        row.push(u8::from(rng.gen_bool(0.01)).to_string()); // Educational special needs
        row.push(u8::from(rng.gen_bool(if struggling { 0.3 } else { 0.05 })).to_string()); // Debtor
        row.push(u8::from(rng.gen_bool(if struggling { 0.6 } else { 0.95 })).to_string()); // Tuition fees up to date
        row.push(u8::from(rng.gen_bool(0.35)).to_string()); // Gender
        row.push(u8::from(rng.gen_bool(if struggling { 0.1 } else { 0.35 })).to_string()); // Scholarship holder
        row.push(rng.gen_range(17..=55).to_string()); // Age at enrollment
        row.push(u8::from(rng.gen_bool(0.03)).to_string()); // International

        // Curricular units, both semesters
        for _ in 0..2 {
            let enrolled = rng.gen_range(5..=8);
            let approved = if struggling {
                rng.gen_range(0..=enrolled / 2)
            } else {
                rng.gen_range(enrolled / 2..=enrolled)
            };
            let grade = if approved == 0 { 0.0 } else { rng.gen_range(10.0..17.5) };

            row.push(rng.gen_range(0..=2).to_string()); // credited
            row.push(enrolled.to_string());
            row.push(rng.gen_range(enrolled..=enrolled + 4).to_string()); // evaluations
            row.push(approved.to_string());
            row.push(format!("{:.2}", grade));
            row.push(rng.gen_range(0..=1).to_string()); // without evaluations
        }

        // Macroeconomic
        row.push(format!("{:.1}", rng.gen_range(7.6..16.2)));
        row.push(format!("{:.1}", rng.gen_range(-0.8..3.7)));
        row.push(format!("{:.2}", rng.gen_range(-4.06..3.51)));

        row
    }

    /// Blank, null-token or non-numeric cell
    fn defect(&mut self) -> String {
        ["", "NA", "unknown", "12,5"]
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("")
            .to_string()
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_students=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("data/students.csv");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let defect_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let struggling_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.3);

    if !(0.0..=1.0).contains(&defect_rate) || !(0.0..=1.0).contains(&struggling_rate) {
        anyhow::bail!("rates must be in [0, 1]");
    }

    info!(
        output = %output,
        count = count,
        defect_rate = defect_rate,
        struggling_rate = struggling_rate,
        "Configuration loaded"
    );

    if let Some(parent) = std::path::Path::new(output).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(output)?;
    writer.write_record(STUDENT_FEATURES)?;

    let mut generator = StudentGenerator::new();
    let mut rng = rand::thread_rng();
    let mut struggling_count = 0;
    let mut defect_count = 0;

    for i in 0..count {
        let struggling = rng.gen_bool(struggling_rate);
        if struggling {
            struggling_count += 1;
        }

        let mut row = generator.generate(struggling);
        if rng.gen_bool(defect_rate) {
            let column = rng.gen_range(0..row.len());
            row[column] = generator.defect();
            defect_count += 1;
        }
        writer.write_record(&row)?;

        if (i + 1) % 1000 == 0 {
            info!("Generated {}/{} students", i + 1, count);
        }
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} students to {} ({} struggling, {} defective rows)",
        count, output, struggling_count, defect_count
    );

    Ok(())
}
