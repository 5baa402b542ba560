use stress_test::{stress_test_gossip, stress_test_partition, stress_test_scaling};
use tracing_subscriber::EnvFilter;
pub mod stress_test;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main())?;
    Ok(())
}

async fn async_main() -> tsae_sdk::Result<()> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            TSAE STRESS TESTS                               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: small cluster, perfect network
    let stats = stress_test_gossip(4, 100, 200, 0.0, 1).await?;
    stats.print();

    // Test 2: small cluster, lossy network
    let stats = stress_test_gossip(4, 100, 200, 0.2, 2).await?;
    stats.print();

    // Test 3: medium cluster, lossy network
    let stats = stress_test_gossip(10, 200, 1000, 0.3, 3).await?;
    stats.print();

    // Test 4: partition and heal
    let stats = stress_test_partition(8, 100, 4).await?;
    stats.print();

    // Test 5: Scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS                                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(16, 4).await?;

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
