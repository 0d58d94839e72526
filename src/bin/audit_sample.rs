use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    audit_sampler::apps::run_audit_sample(std::env::args().skip(1))
}
