use anyhow::Result;

fn main() -> Result<()> {
    dai_example::entrypoint()
}
