//! Test Posting Client
//!
//! Generates job postings and sends them to the detector as NATS requests.
//!
//! Usage: test_client [nats_url] [count] [fraud_rate] [delay_ms] [score|explain]

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Posting structure matching the detector's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    text: String,
    employment_type: String,
    required_experience: String,
    required_education: String,
    telecommuting: i64,
    has_company_logo: i64,
    has_questions: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_n: Option<usize>,
}

/// Posting generator for testing
struct PostingGenerator {
    rng: rand::rngs::ThreadRng,
    posting_counter: u64,
}

impl PostingGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            posting_counter: 0,
        }
    }

    /// Generate an ordinary posting from an established employer
    fn generate_legitimate(&mut self) -> Posting {
        self.posting_counter += 1;
        let title = self.random_choice(&[
            "Senior Backend Engineer",
            "Marketing Coordinator",
            "Registered Nurse",
            "Data Analyst",
            "Customer Success Manager",
        ]);
        let years = self.rng.gen_range(1..8);

        Posting {
            text: format!(
                "{} (ref {}). Join our team in the downtown office. \
                 Requirements: {} years of experience, strong communication skills. \
                 Competitive salary and benefits. Apply through our careers page.",
                title, self.posting_counter, years
            ),
            employment_type: self
                .random_choice(&["Full-time", "Part-time", "Contract"])
                .to_string(),
            required_experience: self
                .random_choice(&["Entry level", "Mid-Senior level", "Associate"])
                .to_string(),
            required_education: self
                .random_choice(&["Bachelor's Degree", "Master's Degree", "High School or equivalent"])
                .to_string(),
            telecommuting: self.rng.gen_bool(0.1) as i64,
            has_company_logo: self.rng.gen_bool(0.95) as i64,
            has_questions: self.rng.gen_bool(0.6) as i64,
            top_n: None,
        }
    }

    /// Generate a posting with typical scam traits
    fn generate_suspicious(&mut self) -> Posting {
        self.posting_counter += 1;
        let pay = self.rng.gen_range(500..3000);

        Posting {
            text: format!(
                "URGENT hiring (ref {})! Work from home, earn ${} per week. \
                 No experience required, no interview. Send your bank details \
                 to get started today.",
                self.posting_counter, pay
            ),
            employment_type: self.random_choice(&["Part-time", "Unknown"]).to_string(),
            required_experience: "Unknown".to_string(),
            required_education: "Unknown".to_string(),
            telecommuting: 1,
            has_company_logo: self.rng.gen_bool(0.1) as i64,
            has_questions: 0,
            top_n: None,
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Posting Client");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
    let fraud_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.3_f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);
    let explain = args.get(5).map(|s| s == "explain").unwrap_or(false);
    let subject = if explain { "jobs.explain" } else { "jobs.score" };

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    // Health first, so a degraded detector is obvious
    match client.request("jobs.health", "".into()).await {
        Ok(reply) => info!("Health: {}", String::from_utf8_lossy(&reply.payload)),
        Err(e) => warn!(error = %e, "Health request failed"),
    }

    let mut generator = PostingGenerator::new();
    let mut rng = rand::thread_rng();
    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let mut posting = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };
        if explain {
            posting.top_n = Some(5);
        }

        let payload = serde_json::to_vec(&posting)?;
        match client.request(subject, payload.into()).await {
            Ok(reply) => info!(
                "Reply {}/{}: {}",
                i + 1,
                count,
                String::from_utf8_lossy(&reply.payload)
            ),
            Err(e) => warn!(error = %e, "Request {} failed", i + 1),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} postings ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = PostingGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let posting = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample posting {}:\n{}", i + 1, serde_json::to_string_pretty(&posting)?);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
