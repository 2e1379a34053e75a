use vm_rebalancer::*;

use vm_rebalancer::models::{
    DomUDiskPlacement, DomUPlacement, PhysicalVolumeAllocation, ProcessorArchitecture,
    ProcessorType,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn main() {
    env_logger::init();

    println!("VM Placement Rebalancer - Example Usage\n");

    let initial = create_sample_configuration();

    let planner = ClusterPlanner::new(Box::new(ExponentialHeuristic));

    println!("=== Checking for Violations ===");
    let violations = planner.check_violations(&initial);
    if violations.is_empty() {
        println!("No violations found!");
    } else {
        for violation in &violations {
            println!(
                "[{:?}] {} (deviation {:.2})",
                violation.level, violation.label, violation.deviation
            );
        }
    }

    println!("\n=== Generating Reconfiguration Plan ===");
    match planner.generate_plan(&initial) {
        OptimizeOutcome::Plan(plan) => {
            println!("{}\n", plan.summary());
            if plan.is_empty() {
                println!("Cluster is already optimal.");
            }
            for (index, step) in plan.moves.iter().enumerate() {
                println!("  {}. {}", index + 1, step.description());
            }
            println!(
                "\nExpanded {} nodes with {}",
                plan.metadata.expanded_nodes, plan.metadata.heuristic
            );
        }
        OptimizeOutcome::Exhausted { expanded_nodes } => {
            println!("No plan exists ({} nodes explored)", expanded_nodes);
        }
        OptimizeOutcome::NodeCapReached { expanded_nodes } => {
            println!("Gave up after {} nodes", expanded_nodes);
        }
        OptimizeOutcome::Cancelled { .. } => {
            println!("Cancelled");
        }
    }
}

/// Two hosts; the web guest overcommits the small one and must trade places
/// with its failover copy on the big one.
fn create_sample_configuration() -> Arc<Configuration> {
    let mut cluster = Cluster::new("rack1");

    let mut small = Dom0::new(
        "xen1.example.com",
        8192,
        ProcessorType::Core2,
        ProcessorArchitecture::X86_64,
        2400,
        4,
        true,
    );
    small.add_disk(Dom0Disk::new("/dev/sda", 7200));
    cluster.add_host(small);

    let mut big = Dom0::new(
        "xen2.example.com",
        32768,
        ProcessorType::Xeon,
        ProcessorArchitecture::X86_64,
        2400,
        8,
        true,
    );
    big.add_disk(Dom0Disk::new("/dev/sda", 10000));
    big.add_disk(Dom0Disk::new("/dev/sdb", 10000));
    cluster.add_host(big);

    let mut www = DomU::new(
        "www.example.com",
        12288,
        4096,
        2,
        1024,
        None,
        ProcessorArchitecture::X86_64,
        -1,
        false,
    );
    www.add_disk(DomUDisk::new("/dev/xvda", 1000, 7200, 512));
    cluster.add_guest(www);

    let mut disks = BTreeMap::new();
    disks.insert(
        "/dev/xvda".to_string(),
        DomUDiskPlacement {
            primary_volumes: vec![PhysicalVolumeAllocation::new(
                "xen1.example.com",
                "/dev/sda",
                1000,
            )],
            secondary_volumes: vec![PhysicalVolumeAllocation::new(
                "xen2.example.com",
                "/dev/sda",
                1000,
            )],
        },
    );
    let mut placements = BTreeMap::new();
    placements.insert(
        "www.example.com".to_string(),
        DomUPlacement {
            primary_host: "xen1.example.com".to_string(),
            secondary_host: Some("xen2.example.com".to_string()),
            disks,
        },
    );

    Arc::new(
        Configuration::new(Arc::new(cluster), placements)
            .expect("sample configuration is structurally valid"),
    )
}
