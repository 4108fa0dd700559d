//! `stagehand platforms` - list supported platforms and their rules.

use stagehand_core::policy_for;
use stagehand_schema::Platform;

pub fn platforms() {
    for platform in Platform::ALL {
        let policy = policy_for(platform);
        let serving = if policy.requires_network_file_server {
            "network file server"
        } else {
            "staged copy"
        };
        println!("{platform:<8} content: {serving}");
        if !policy.exclusions.is_empty() {
            println!("         excludes: {}", policy.exclusions.join(", "));
        }
        if !policy.requires_executable_bit.is_empty() {
            println!(
                "         executable: {}",
                policy.requires_executable_bit.join(", ")
            );
        }
    }
}
