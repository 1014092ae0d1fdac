fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `prost::Name` impls with `type.googleapis.com/` type URLs, used as
    // routing tags for `Any` payloads
    let mut config = prost_build::Config::new();
    config.enable_type_names();
    config.type_name_domain(["."], "type.googleapis.com");

    // the agent only dials the core; `Endpoint` is built by GrpcTransport
    tonic_build::configure()
        .build_server(false)
        .build_transport(false)
        .compile_protos_with_config(config, &["proto/tunnel.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("protobuf compile error: {e}"));

    Ok(())
}
