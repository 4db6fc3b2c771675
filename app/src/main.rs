fn main() -> anyhow::Result<()> {
    twinroute_lib::run()
}
