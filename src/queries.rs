use crate::types::{QueryComplexity, TestConfiguration};

pub const SIMPLE_QUERIES: &[&str] = &[
    "Hola, como estas?",
    "Que es Python?",
    "Explica que es una variable",
    "Que es un bucle for?",
    "Como se define una funcion?",
];

pub const MEDIUM_QUERIES: &[&str] = &[
    "Explica la diferencia entre una lista y una tupla en Python",
    "Como funciona la herencia en programacion orientada a objetos?",
    "Que es un decorador en Python y para que sirve?",
    "Explica el patron de diseno MVC",
    "Como se implementa una pila usando listas?",
];

pub const COMPLEX_QUERIES: &[&str] = &[
    "Explica en detalle como funciona el garbage collector de Python y como optimizar el uso de memoria",
    "Describe la arquitectura de microservicios, sus ventajas, desventajas y cuando usarla vs monolito",
    "Explica el algoritmo de ordenamiento quicksort, su complejidad temporal y espacial con ejemplos",
    "Como implementarias un sistema de cache distribuido con invalidacion automatica?",
    "Explica las diferencias entre procesos, threads y asyncio en Python con casos de uso",
];

/// Sample table for a complexity class. `Mixed` concatenates every class.
/// `Custom` has no table of its own and falls back to `Medium`.
pub fn sample_table(complexity: QueryComplexity) -> Vec<&'static str> {
    match complexity {
        QueryComplexity::Simple => SIMPLE_QUERIES.to_vec(),
        QueryComplexity::Medium | QueryComplexity::Custom => MEDIUM_QUERIES.to_vec(),
        QueryComplexity::Complex => COMPLEX_QUERIES.to_vec(),
        QueryComplexity::Mixed => SIMPLE_QUERIES
            .iter()
            .chain(MEDIUM_QUERIES)
            .chain(COMPLEX_QUERIES)
            .copied()
            .collect(),
    }
}

/// Cycles `pool` to exactly `count` entries: the i-th query is `pool[i % len]`.
pub fn cycle<S: AsRef<str>>(pool: &[S], count: usize) -> Vec<String> {
    if pool.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| pool[i % pool.len()].as_ref().to_string())
        .collect()
}

/// Deterministic query list for a whole test, `total_queries()` long.
///
/// Sample tables are cycled over the whole list, so the i-th query is
/// `table[i % len]` and every prompt gets sent once the list is long enough.
/// Custom lists are cycled lane by lane instead: every virtual user gets
/// `queries_per_user` entries starting from the first custom query.
pub fn build_query_pool(config: &TestConfiguration) -> Vec<String> {
    let total = config.total_queries();
    if config.custom_queries.is_empty() {
        return cycle(&sample_table(config.complexity), total);
    }
    let lane = cycle(&config.custom_queries, config.queries_per_user as usize);
    lane.iter().cloned().cycle().take(total).collect()
}
